// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport and tunnel settings.
//!
//! [`ModbusConfig`] is what the `transport` section of a configuration file
//! deserializes into; the `type` key selects TCP or RTU. [`TunnelConfig`] is
//! the `tunnel` section. Durations use humantime notation (`"50ms"`, `"3s"`).
//!
//! ```
//! use std::time::Duration;
//! use mbserial_modbus::types::{ModbusRtuConfig, Parity};
//!
//! let rtu = ModbusRtuConfig::new("/dev/ttyUSB0")
//!     .with_baud_rate(19200)
//!     .with_parity(Parity::Even)
//!     .with_timeout(Duration::from_millis(300));
//! assert!(rtu.validate().is_ok());
//! assert_eq!(rtu.line_settings(), "19200 8E1");
//! ```

use std::fmt;
use std::time::Duration;

use mbserial_protocol::Layout;
use serde::{Deserialize, Serialize};

use crate::client::retry::RetryConfig;
use crate::error::{ConfigurationError, ModbusError, ModbusResult};

/// Baud rates accepted for an RTU line.
pub const VALID_BAUD_RATES: &[u32] = &[
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

mod defaults {
    use std::time::Duration;

    pub fn tcp_port() -> u16 {
        502
    }

    pub fn unit_id() -> u8 {
        1
    }

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn request_timeout() -> Duration {
        Duration::from_secs(1)
    }

    pub fn nodelay() -> bool {
        true
    }

    pub fn baud_rate() -> u32 {
        9600
    }

    pub fn poll_interval() -> Duration {
        Duration::from_millis(50)
    }

    pub fn max_transmit_cycles() -> u32 {
        256
    }
}

fn invalid(error: ConfigurationError) -> ModbusError {
    ModbusError::configuration(error)
}

fn check_unit_id(unit_id: u8) -> ModbusResult<()> {
    match unit_id {
        1..=247 => Ok(()),
        other => Err(invalid(ConfigurationError::invalid_unit_id(other))),
    }
}

fn check_nonzero(duration: Duration, what: &str) -> ModbusResult<()> {
    if duration.is_zero() {
        return Err(invalid(ConfigurationError::invalid_timeout(
            duration,
            format!("{what} must be non-zero"),
        )));
    }
    Ok(())
}

/// A Modbus TCP gateway in front of the tunnel device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusTcpConfig {
    /// Gateway host name or address.
    pub host: String,

    /// Gateway port.
    #[serde(default = "defaults::tcp_port")]
    pub port: u16,

    /// Unit id of the tunnel device behind the gateway.
    #[serde(default = "defaults::unit_id")]
    pub unit_id: u8,

    /// Deadline for the TCP handshake.
    #[serde(default = "defaults::connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline for each register request.
    #[serde(default = "defaults::request_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Disable Nagle's algorithm on the socket.
    #[serde(default = "defaults::nodelay")]
    pub tcp_nodelay: bool,
}

impl ModbusTcpConfig {
    /// Gateway at `host` on the standard port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: defaults::tcp_port(),
            unit_id: defaults::unit_id(),
            connect_timeout: defaults::connect_timeout(),
            operation_timeout: defaults::request_timeout(),
            tcp_nodelay: defaults::nodelay(),
        }
    }

    /// Gateway at `host:port`.
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            port,
            ..Self::new(host)
        }
    }

    /// Replaces the unit id.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Replaces the connect deadline.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replaces the per-request deadline.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// `host:port`, ready for resolution.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.trim().is_empty() {
            return Err(invalid(ConfigurationError::missing_field("transport.host")));
        }
        if self.port == 0 {
            return Err(invalid(ConfigurationError::invalid_port(0, "port 0 is reserved")));
        }
        check_unit_id(self.unit_id)?;
        check_nonzero(self.connect_timeout, "connect_timeout")?;
        check_nonzero(self.operation_timeout, "operation_timeout")
    }
}

/// A tunnel device on a local RS-485/RS-232 line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusRtuConfig {
    /// Serial device, for example `/dev/ttyUSB0` or `COM3`.
    pub port: String,

    /// Line speed of the Modbus bus. Not the tunnelled serial data rate.
    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,

    /// Data bits per character.
    #[serde(default)]
    pub data_bits: DataBits,

    /// Parity.
    #[serde(default)]
    pub parity: Parity,

    /// Stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Unit id of the tunnel device.
    #[serde(default = "defaults::unit_id")]
    pub unit_id: u8,

    /// Deadline for each register request.
    #[serde(default = "defaults::request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl ModbusRtuConfig {
    /// `port` at 9600 8N1, unit 1.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: defaults::baud_rate(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            unit_id: defaults::unit_id(),
            timeout: defaults::request_timeout(),
        }
    }

    /// Replaces the bus speed.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Replaces the data bits.
    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Replaces the parity.
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Replaces the stop bits.
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Replaces the unit id.
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Replaces the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Line settings in `9600 8N1` notation.
    pub fn line_settings(&self) -> String {
        format!(
            "{} {}{}{}",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.port.trim().is_empty() {
            return Err(invalid(ConfigurationError::missing_field("transport.port")));
        }
        if !VALID_BAUD_RATES.contains(&self.baud_rate) {
            return Err(invalid(ConfigurationError::InvalidBaudRate {
                baud_rate: self.baud_rate,
            }));
        }
        check_unit_id(self.unit_id)?;
        check_nonzero(self.timeout, "timeout")
    }
}

/// Data bits per character on an RTU line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    /// Five.
    Five,
    /// Six.
    Six,
    /// Seven.
    Seven,
    /// Eight.
    #[default]
    Eight,
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        };
        write!(f, "{n}")
    }
}

/// Parity on an RTU line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd.
    Odd,
    /// Even.
    Even,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "N",
            Self::Odd => "O",
            Self::Even => "E",
        })
    }
}

/// Stop bits on an RTU line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    /// One.
    #[default]
    One,
    /// Two.
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::One => "1",
            Self::Two => "2",
        })
    }
}

/// Which transport reaches the tunnel device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModbusConfig {
    /// Through a Modbus TCP gateway.
    Tcp(ModbusTcpConfig),
    /// Directly on a serial bus.
    Rtu(ModbusRtuConfig),
}

impl ModbusConfig {
    /// Whether this is an RTU transport.
    pub const fn is_rtu(&self) -> bool {
        matches!(self, Self::Rtu(_))
    }

    /// Unit id of the tunnel device.
    pub fn unit_id(&self) -> u8 {
        match self {
            Self::Tcp(c) => c.unit_id,
            Self::Rtu(c) => c.unit_id,
        }
    }

    /// Per-request deadline.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Tcp(c) => c.operation_timeout,
            Self::Rtu(c) => c.timeout,
        }
    }

    /// Endpoint as shown in logs and reports.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Tcp(c) => format!("tcp://{}", c.socket_addr()),
            Self::Rtu(c) => format!("rtu://{} ({})", c.port, c.line_settings()),
        }
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::Tcp(c) => c.validate(),
            Self::Rtu(c) => c.validate(),
        }
    }

    /// TCP settings, if this is a TCP transport.
    pub fn as_tcp(&self) -> Option<&ModbusTcpConfig> {
        match self {
            Self::Tcp(c) => Some(c),
            Self::Rtu(_) => None,
        }
    }

    /// RTU settings, if this is an RTU transport.
    pub fn as_rtu(&self) -> Option<&ModbusRtuConfig> {
        match self {
            Self::Rtu(c) => Some(c),
            Self::Tcp(_) => None,
        }
    }
}

impl From<ModbusTcpConfig> for ModbusConfig {
    fn from(config: ModbusTcpConfig) -> Self {
        Self::Tcp(config)
    }
}

impl From<ModbusRtuConfig> for ModbusConfig {
    fn from(config: ModbusRtuConfig) -> Self {
        Self::Rtu(config)
    }
}

/// How the tunnel drives the register windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Register layout implemented by the device firmware.
    #[serde(default)]
    pub layout: Layout,

    /// Pause between poll cycles.
    #[serde(default = "defaults::poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Cycles `transmit_all` may spend before giving up on a payload.
    #[serde(default = "defaults::max_transmit_cycles")]
    pub max_transmit_cycles: u32,

    /// Retry policy for single register requests.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl TunnelConfig {
    /// Defaults for `layout`.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            ..Default::default()
        }
    }

    /// Replaces the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replaces the transmit cycle budget.
    pub fn with_max_transmit_cycles(mut self, cycles: u32) -> Self {
        self.max_transmit_cycles = cycles;
        self
    }

    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.poll_interval.is_zero() {
            return Err(invalid(ConfigurationError::invalid_tunnel(
                "poll_interval",
                "must be non-zero",
            )));
        }
        if self.max_transmit_cycles == 0 {
            return Err(invalid(ConfigurationError::invalid_tunnel(
                "max_transmit_cycles",
                "must be at least 1",
            )));
        }
        Ok(())
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            poll_interval: defaults::poll_interval(),
            max_transmit_cycles: defaults::max_transmit_cycles(),
            retry: RetryConfig::default(),
        }
    }
}
