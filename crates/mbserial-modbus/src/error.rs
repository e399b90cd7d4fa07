// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while talking to a tunnel device.
//!
//! ```text
//! ModbusError
//! ├── Connection    - endpoint unreachable, serial port unusable, link dropped
//! ├── Protocol      - exception replies, mismatched replies
//! ├── Operation     - a register read or write the device refused
//! ├── Configuration - settings rejected before any I/O
//! ├── Timeout       - a bus transaction overran its deadline
//! └── Tunnel        - the serial side of the device misbehaved
//! ```
//!
//! Every error carries a stable [`ErrorCode`], a retry verdict and a short
//! list of operator hints.
//!
//! ```
//! use std::io;
//!
//! use mbserial_modbus::error::{ConnectionError, ModbusError};
//!
//! let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
//! let error = ModbusError::connection(ConnectionError::refused_with("192.168.1.100", 502, refused));
//! assert!(error.is_retryable());
//! assert_eq!(error.error_code().to_string(), "MB-0101");
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

/// Top-level error for transport and tunnel operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// The transport could not reach or keep the device.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The device answered, but not with what was asked for.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// A register request failed below the Modbus layer.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Settings were rejected.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A transaction ran out of time.
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// The serial side of the tunnel failed.
    #[error("{0}")]
    Tunnel(#[from] TunnelError),
}

impl ModbusError {
    /// Wraps a [`ConnectionError`].
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Wraps a [`ProtocolError`].
    pub fn protocol(error: ProtocolError) -> Self {
        Self::Protocol(error)
    }

    /// Wraps an [`OperationError`].
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Wraps a [`ConfigurationError`].
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Wraps a [`TimeoutError`].
    pub fn timeout(error: TimeoutError) -> Self {
        Self::Timeout(error)
    }

    /// Wraps a [`TunnelError`].
    pub fn tunnel(error: TunnelError) -> Self {
        Self::Tunnel(error)
    }

    /// The transport was used before `connect`.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// A register read did not finish within `duration`.
    pub fn read_timeout(duration: Duration) -> Self {
        Self::Timeout(TimeoutError::read(duration))
    }

    /// A register write did not finish within `duration`.
    pub fn write_timeout(duration: Duration) -> Self {
        Self::Timeout(TimeoutError::write(duration))
    }

    /// The device answered `function_code` with an exception.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception_response(function_code, exception_code))
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Protocol(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Tunnel(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            Self::Configuration(_) => false,
        }
    }

    /// How loudly this error should be reported.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Protocol(e) => e.severity(),
            Self::Operation(e) => e.severity(),
            Self::Tunnel(e) => e.severity(),
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Short category name used in logs and by the bridge loop.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Operation(_) => "operation",
            Self::Configuration(_) => "configuration",
            Self::Timeout(_) => "timeout",
            Self::Tunnel(_) => "tunnel",
        }
    }

    /// Stable code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => ErrorCode::new(1, e.code()),
            Self::Protocol(e) => ErrorCode::new(2, e.code()),
            Self::Operation(e) => ErrorCode::new(3, e.code()),
            Self::Configuration(e) => ErrorCode::new(5, e.code()),
            Self::Timeout(e) => ErrorCode::new(6, e.code()),
            Self::Tunnel(e) => ErrorCode::new(7, e.code()),
        }
    }

    /// Things an operator can check.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        let hints = match self {
            Self::Connection(e) => e.hints(),
            Self::Protocol(e) => e.hints(),
            Self::Operation(e) => e.hints(),
            Self::Configuration(e) => e.hints(),
            Self::Timeout(_) => &[
                "Raise the transport timeout if the bus is slow",
                "Make sure no other master is polling the device",
            ],
            Self::Tunnel(e) => e.hints(),
        };
        hints.to_vec()
    }

    /// Emits this error through `tracing` at its severity.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        let category = self.category();
        let retryable = self.is_retryable();

        match self.severity().to_tracing_level() {
            Level::ERROR => {
                tracing::error!(%code, category, context, retryable, "{self}")
            }
            Level::WARN => {
                tracing::warn!(%code, category, context, retryable, "{self}")
            }
            _ => tracing::debug!(%code, category, context, retryable, "{self}"),
        }
    }
}

impl From<mbserial_protocol::ProtocolError> for ModbusError {
    fn from(error: mbserial_protocol::ProtocolError) -> Self {
        Self::Tunnel(TunnelError::Codec(error))
    }
}

/// Failures to open or keep the transport.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The gateway refused the TCP connection.
    #[error("{host}:{port} refused the connection")]
    Refused {
        /// Gateway host.
        host: String,
        /// Gateway port.
        port: u16,
        /// Socket error, when one was reported.
        #[source]
        source: Option<io::Error>,
    },

    /// No TCP handshake within the connect timeout.
    #[error("no answer from {host}:{port} within {duration:?}")]
    TimedOut {
        /// Gateway host.
        host: String,
        /// Gateway port.
        port: u16,
        /// Connect timeout that elapsed.
        duration: Duration,
    },

    /// The gateway host name did not resolve.
    #[error("cannot resolve '{hostname}'")]
    DnsResolutionFailed {
        /// Name that was looked up.
        hostname: String,
        /// Resolver error.
        #[source]
        source: Option<io::Error>,
    },

    /// The RTU serial device does not exist.
    #[error("serial device {port} does not exist")]
    SerialPortNotFound {
        /// Device path.
        port: String,
    },

    /// The RTU serial device exists but cannot be opened.
    #[error("permission denied opening {port}")]
    SerialPortAccessDenied {
        /// Device path.
        port: String,
    },

    /// The RTU serial device rejected its line settings.
    #[error("cannot configure {port}: {message}")]
    SerialConfigurationFailed {
        /// Device path.
        port: String,
        /// Driver message.
        message: String,
    },

    /// The peer hung up.
    #[error("transport closed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason, when known.
        reason: Option<String>,
    },

    /// Used before `connect`.
    #[error("transport is not connected")]
    NotConnected,
}

impl ConnectionError {
    /// Refusal carrying the socket error.
    pub fn refused_with(host: impl Into<String>, port: u16, source: io::Error) -> Self {
        Self::Refused {
            host: host.into(),
            port,
            source: Some(source),
        }
    }

    /// Connect timeout elapsed.
    pub fn timed_out(host: impl Into<String>, port: u16, duration: Duration) -> Self {
        Self::TimedOut {
            host: host.into(),
            port,
            duration,
        }
    }

    /// Host name lookup failed. `source` is `None` when the name resolved
    /// to no addresses.
    pub fn dns_failed(hostname: impl Into<String>, source: Option<io::Error>) -> Self {
        Self::DnsResolutionFailed {
            hostname: hostname.into(),
            source,
        }
    }

    /// Serial device missing.
    pub fn serial_not_found(port: impl Into<String>) -> Self {
        Self::SerialPortNotFound { port: port.into() }
    }

    /// Serial device not accessible.
    pub fn serial_access_denied(port: impl Into<String>) -> Self {
        Self::SerialPortAccessDenied { port: port.into() }
    }

    /// Serial device rejected its settings.
    pub fn serial_config(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SerialConfigurationFailed {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Peer hung up.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Serial device problems need a human; network problems may clear up.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::SerialPortNotFound { .. }
                | Self::SerialPortAccessDenied { .. }
                | Self::SerialConfigurationFailed { .. }
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::TimedOut { .. } | Self::Closed { .. } => {
                ErrorSeverity::Warning
            }
            Self::SerialPortAccessDenied { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Refused { .. } => 1,
            Self::TimedOut { .. } => 2,
            Self::DnsResolutionFailed { .. } => 3,
            Self::SerialPortNotFound { .. } => 5,
            Self::SerialPortAccessDenied { .. } => 6,
            Self::SerialConfigurationFailed { .. } => 7,
            Self::Closed { .. } => 8,
            Self::NotConnected => 9,
        }
    }

    fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::Refused { .. } | Self::TimedOut { .. } => &[
                "Confirm the gateway is powered and reachable",
                "Check transport.host and transport.port",
            ],
            Self::DnsResolutionFailed { .. } => &["Use the gateway's IP address instead"],
            Self::SerialPortNotFound { .. } => &[
                "Check transport.port names an existing device node",
                "Reconnect the USB adapter",
            ],
            Self::SerialPortAccessDenied { .. } => {
                &["Run as a member of the group owning the device node"]
            }
            Self::SerialConfigurationFailed { .. } => {
                &["Match baud_rate, parity and stop_bits to the device"]
            }
            Self::Closed { .. } | Self::NotConnected => &["The bridge reconnects on its own"],
        }
    }
}

/// Replies that break the request/response contract.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device answered with a Modbus exception.
    #[error("function {function_code:#04x} rejected with exception {exception_code} ({exception_name})")]
    ExceptionResponse {
        /// Function code of the request.
        function_code: u8,
        /// Exception code in the reply.
        exception_code: u8,
        /// Standard name of the exception.
        exception_name: String,
    },

    /// The reply does not belong to the request.
    #[error("mismatched reply: {message}")]
    UnexpectedResponse {
        /// What did not match.
        message: String,
    },
}

impl ProtocolError {
    /// Exception reply to `function_code`.
    pub fn exception_response(function_code: u8, exception_code: u8) -> Self {
        Self::ExceptionResponse {
            function_code,
            exception_code,
            exception_name: Self::exception_name(exception_code).to_string(),
        }
    }

    /// Mismatched reply.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Standard name of a Modbus exception code.
    pub fn exception_name(code: u8) -> &'static str {
        match code {
            0x01 => "Illegal Function",
            0x02 => "Illegal Data Address",
            0x03 => "Illegal Data Value",
            0x04 => "Server Device Failure",
            0x05 => "Acknowledge",
            0x06 => "Server Device Busy",
            0x08 => "Memory Parity Error",
            0x0A => "Gateway Path Unavailable",
            0x0B => "Gateway Target No Response",
            _ => "Unknown",
        }
    }

    /// Busy, acknowledge and gateway-target exceptions are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExceptionResponse { exception_code, .. } => {
                matches!(exception_code, 0x05 | 0x06 | 0x0B)
            }
            Self::UnexpectedResponse { .. } => true,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ExceptionResponse {
                exception_code: 0x05 | 0x06,
                ..
            }
            | Self::UnexpectedResponse { .. } => ErrorSeverity::Warning,
            Self::ExceptionResponse {
                exception_code: 0x01..=0x03,
                ..
            } => ErrorSeverity::Error,
            Self::ExceptionResponse { .. } => ErrorSeverity::Critical,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::ExceptionResponse { exception_code, .. } => *exception_code,
            Self::UnexpectedResponse { .. } => 0x40,
        }
    }

    fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::ExceptionResponse {
                exception_code: 0x01,
                ..
            } => &["The device does not implement holding registers"],
            Self::ExceptionResponse {
                exception_code: 0x02,
                ..
            } => &["tunnel.layout probably does not match the device firmware"],
            Self::ExceptionResponse {
                exception_code: 0x05 | 0x06,
                ..
            } => &["The device is busy; the request will be retried"],
            Self::ExceptionResponse { .. } => &["Inspect the device's own diagnostics"],
            Self::UnexpectedResponse { .. } => &[
                "Check transport.unit_id",
                "Make sure only one master is on the bus",
            ],
        }
    }
}

/// Register requests that failed without a Modbus exception.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Reading holding registers failed.
    #[error("reading {count} register(s) at {address} failed: {message}")]
    ReadFailed {
        /// First register address.
        address: u16,
        /// Registers requested.
        count: u16,
        /// Failure description.
        message: String,
        /// Underlying failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Writing holding registers failed.
    #[error("writing register {address} failed: {message}")]
    WriteFailed {
        /// First register address.
        address: u16,
        /// Failure description.
        message: String,
        /// Underlying failure.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single request cannot carry this many registers.
    #[error("{count} registers is outside {min}..={max}")]
    InvalidRegisterCount {
        /// Registers requested.
        count: usize,
        /// Lower bound.
        min: u16,
        /// Upper bound.
        max: u16,
    },
}

impl OperationError {
    /// Read failure caused by `source`.
    pub fn read_failed(
        address: u16,
        count: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ReadFailed {
            address,
            count,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Write failure caused by `source`.
    pub fn write_failed(address: u16, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::WriteFailed {
            address,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Request size out of bounds.
    pub fn invalid_count(count: usize, min: u16, max: u16) -> Self {
        Self::InvalidRegisterCount { count, min, max }
    }

    /// Only I/O failures are worth repeating.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRegisterCount { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidRegisterCount { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::ReadFailed { .. } => 1,
            Self::WriteFailed { .. } => 2,
            Self::InvalidRegisterCount { .. } => 4,
        }
    }

    fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::ReadFailed { .. } | Self::WriteFailed { .. } => {
                &["Transient bus errors are retried automatically"]
            }
            Self::InvalidRegisterCount { .. } => {
                &["Reads carry at most 125 registers and writes at most 123"]
            }
        }
    }
}

/// Settings rejected during validation.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Unusable TCP port.
    #[error("port {port} is not usable: {reason}")]
    InvalidPort {
        /// Configured port.
        port: u16,
        /// Why it was rejected.
        reason: String,
    },

    /// Unit id outside 1..=247.
    #[error("unit id {unit_id} is outside 1-247")]
    InvalidUnitId {
        /// Configured unit id.
        unit_id: u8,
    },

    /// Baud rate not in the supported set.
    #[error("unsupported baud rate {baud_rate}")]
    InvalidBaudRate {
        /// Configured rate.
        baud_rate: u32,
    },

    /// Timeout or interval out of range.
    #[error("{duration:?} rejected: {reason}")]
    InvalidTimeout {
        /// Configured duration.
        duration: Duration,
        /// Why it was rejected.
        reason: String,
    },

    /// Required value absent or empty.
    #[error("'{field}' must be set")]
    MissingField {
        /// Setting name.
        field: String,
    },

    /// Bad value under `tunnel`.
    #[error("tunnel.{field}: {reason}")]
    InvalidTunnel {
        /// Setting name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Unusable TCP port.
    pub fn invalid_port(port: u16, reason: impl Into<String>) -> Self {
        Self::InvalidPort {
            port,
            reason: reason.into(),
        }
    }

    /// Unit id outside the addressable range.
    pub fn invalid_unit_id(unit_id: u8) -> Self {
        Self::InvalidUnitId { unit_id }
    }

    /// Duration out of range.
    pub fn invalid_timeout(duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidTimeout {
            duration,
            reason: reason.into(),
        }
    }

    /// Required value absent.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Bad tunnel setting.
    pub fn invalid_tunnel(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTunnel {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::InvalidPort { .. } => 2,
            Self::InvalidUnitId { .. } => 3,
            Self::InvalidBaudRate { .. } => 4,
            Self::InvalidTimeout { .. } => 5,
            Self::MissingField { .. } => 6,
            Self::InvalidTunnel { .. } => 9,
        }
    }

    fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::InvalidPort { .. } => &["Modbus TCP gateways normally listen on 502"],
            Self::InvalidUnitId { .. } => &["Use a unit id between 1 and 247; 0 is broadcast"],
            Self::InvalidBaudRate { .. } => &["Pick one of 1200 through 115200"],
            Self::InvalidTimeout { .. } => &["Durations must be non-zero"],
            Self::MissingField { .. } => &["Run `mbserial validate --show-config`"],
            Self::InvalidTunnel { .. } => &["Layouts are rx_tx and input_output"],
        }
    }
}

/// Deadlines that elapsed.
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// A register read.
    #[error("read timed out after {duration:?}")]
    Read {
        /// Deadline.
        duration: Duration,
    },

    /// A register write.
    #[error("write timed out after {duration:?}")]
    Write {
        /// Deadline.
        duration: Duration,
    },

    /// Waiting for a reply frame.
    #[error("no reply after {duration:?}")]
    Response {
        /// Deadline.
        duration: Duration,
    },
}

impl TimeoutError {
    /// Read deadline elapsed.
    pub fn read(duration: Duration) -> Self {
        Self::Read { duration }
    }

    /// Write deadline elapsed.
    pub fn write(duration: Duration) -> Self {
        Self::Write { duration }
    }

    /// Reply deadline elapsed.
    pub fn response(duration: Duration) -> Self {
        Self::Response { duration }
    }

    /// The deadline that elapsed.
    pub fn duration(&self) -> Duration {
        match *self {
            Self::Read { duration }
            | Self::Write { duration }
            | Self::Response { duration } => duration,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Read { .. } => 2,
            Self::Write { .. } => 3,
            Self::Response { .. } => 4,
        }
    }
}

/// Failures on the serial side of the tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The device reports its serial media as disconnected.
    #[error("serial link down after {sent} of {total} characters")]
    LinkDown {
        /// Characters delivered before the link dropped.
        sent: usize,
        /// Characters requested.
        total: usize,
    },

    /// The device kept reporting no transmit room.
    #[error("transmit stalled for {cycles} cycles, {sent} of {total} characters sent")]
    TransmitStalled {
        /// Cycles attempted.
        cycles: u32,
        /// Characters delivered.
        sent: usize,
        /// Characters requested.
        total: usize,
    },

    /// The layout has no register for the feature.
    #[error("{feature} is not available on the {layout} layout")]
    Unsupported {
        /// Layout name.
        layout: String,
        /// Feature name.
        feature: &'static str,
    },

    /// Register payload could not be decoded.
    #[error("bad register payload: {0}")]
    Codec(#[from] mbserial_protocol::ProtocolError),
}

impl TunnelError {
    /// Feature missing from `layout`.
    pub fn unsupported(layout: impl fmt::Display, feature: &'static str) -> Self {
        Self::Unsupported {
            layout: layout.to_string(),
            feature,
        }
    }

    /// Link and flow-control problems clear up on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LinkDown { .. } | Self::TransmitStalled { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        if self.is_retryable() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::LinkDown { .. } => 1,
            Self::TransmitStalled { .. } => 2,
            Self::Unsupported { .. } => 3,
            Self::Codec(_) => 4,
        }
    }

    fn hints(&self) -> &'static [&'static str] {
        match self {
            Self::LinkDown { .. } => &["Check the cable between the device and the serial peer"],
            Self::TransmitStalled { .. } => &[
                "The serial peer is not reading its input",
                "Raise tunnel.max_transmit_cycles for slow peers",
            ],
            Self::Unsupported { .. } => &["Only the rx_tx layout exposes the baud rate register"],
            Self::Codec(_) => &["tunnel.layout probably does not match the device firmware"],
        }
    }
}

/// How an error should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Expected during normal operation.
    Info,
    /// Recoverable without intervention.
    Warning,
    /// Needs attention.
    Error,
    /// Nothing will work until fixed.
    Critical,
}

impl ErrorSeverity {
    /// Maps to a `tracing` level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Stable error code, rendered as `MB-CCNN`.
///
/// Categories: 1 connection, 2 protocol (exception code as number),
/// 3 operation, 5 configuration, 6 timeout, 7 tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category number.
    pub category: u8,
    /// Number within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Builds a code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MB-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result alias for transport and tunnel operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_port_errors_are_final() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(ConnectionError::refused_with("gw", 502, refused).is_retryable());
        assert!(ConnectionError::closed(None).is_retryable());
        assert!(ConnectionError::NotConnected.is_retryable());
        assert!(!ConnectionError::serial_access_denied("/dev/ttyUSB0").is_retryable());
        assert!(!ConnectionError::serial_not_found("/dev/ttyUSB9").is_retryable());
    }

    #[test]
    fn test_closed_message() {
        assert_eq!(ConnectionError::closed(None).to_string(), "transport closed");
        assert_eq!(
            ConnectionError::closed(Some("reset by peer".into())).to_string(),
            "transport closed: reset by peer"
        );
    }

    #[test]
    fn test_busy_exception_is_transient() {
        assert!(ProtocolError::exception_response(0x03, 0x06).is_retryable());
        assert!(!ProtocolError::exception_response(0x03, 0x02).is_retryable());
        assert_eq!(ProtocolError::exception_name(0x02), "Illegal Data Address");
    }

    #[test]
    fn test_exception_code_carried_in_error_code() {
        let error = ModbusError::exception(0x10, 0x02);
        assert_eq!(error.error_code().to_string(), "MB-0202");
        assert_eq!(error.severity(), ErrorSeverity::Error);
        assert!(error.recovery_hints()[0].contains("layout"));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let error = ModbusError::read_timeout(Duration::from_secs(4));
        assert!(error.is_retryable());
        assert_eq!(error.category(), "timeout");
        assert_eq!(error.error_code().to_string(), "MB-0602");
        assert_eq!(TimeoutError::read(Duration::from_secs(4)).duration(), Duration::from_secs(4));
    }

    #[test]
    fn test_tunnel_errors() {
        let down = ModbusError::tunnel(TunnelError::LinkDown { sent: 3, total: 10 });
        assert_eq!(down.category(), "tunnel");
        assert!(down.is_retryable());
        assert_eq!(down.error_code().to_string(), "MB-0701");
        assert!(down.to_string().contains("3 of 10"));

        let unsupported = TunnelError::unsupported("input_output", "baud rate");
        assert!(!unsupported.is_retryable());
        assert!(unsupported.to_string().contains("input_output"));
    }

    #[test]
    fn test_codec_error_conversion() {
        let codec = mbserial_protocol::ProtocolError::InsufficientRegisters {
            chars: 5,
            expected: 3,
            actual: 2,
        };
        let error: ModbusError = codec.into();
        assert!(matches!(error, ModbusError::Tunnel(TunnelError::Codec(_))));
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_configuration_errors_are_critical() {
        let error = ConfigurationError::invalid_unit_id(0);
        assert!(error.to_string().contains("1-247"));

        let error = ModbusError::configuration(error);
        assert!(!error.is_retryable());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(error.recovery_hints().iter().any(|h| h.contains("247")));
    }

    #[test]
    fn test_operation_count_not_retryable() {
        let error = ModbusError::operation(OperationError::invalid_count(200, 1, 125));
        assert!(!error.is_retryable());
        assert_eq!(error.to_string(), "200 registers is outside 1..=125");
    }

    #[test]
    fn test_constructors_keep_their_source() {
        use std::error::Error as _;

        let read = OperationError::read_failed(1001, 1, io::Error::other("crc mismatch"));
        assert_eq!(read.to_string(), "reading 1 register(s) at 1001 failed: crc mismatch");
        assert!(read.source().is_some());

        let write = OperationError::write_failed(2061, io::Error::other("frame dropped"));
        assert_eq!(write.to_string(), "writing register 2061 failed: frame dropped");
        assert!(write.source().is_some());

        let lookup = io::Error::new(io::ErrorKind::NotFound, "no such host");
        let dns = ModbusError::connection(ConnectionError::dns_failed("gateway.local", Some(lookup)));
        assert_eq!(dns.to_string(), "cannot resolve 'gateway.local'");
        assert_eq!(dns.error_code().to_string(), "MB-0103");
        assert!(ConnectionError::dns_failed("gateway.local", None).source().is_none());

        let write_timeout = ModbusError::write_timeout(std::time::Duration::from_millis(250));
        assert!(matches!(write_timeout, ModbusError::Timeout(TimeoutError::Write { .. })));
        assert_eq!(write_timeout.error_code().to_string(), "MB-0603");
    }
}
