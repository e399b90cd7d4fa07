// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus RTU transport, for a tunnel device on a local serial bus.
//!
//! `tokio-serial` opens the port and `tokio-modbus` does the RTU framing.
//!
//! ```rust,ignore
//! use mbserial_modbus::client::{ModbusRtuTransport, ModbusTransport};
//! use mbserial_modbus::types::{ModbusRtuConfig, Parity};
//!
//! let config = ModbusRtuConfig::new("/dev/ttyUSB0")
//!     .with_baud_rate(19200)
//!     .with_parity(Parity::Even);
//! let mut transport = ModbusRtuTransport::new(config);
//! transport.connect().await?;
//! ```

use std::io;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_serial::SerialPortBuilderExt;

use crate::error::{ConnectionError, ModbusError, ModbusResult};
use crate::types::{DataBits, ModbusRtuConfig, Parity, StopBits};

use super::transport::{ModbusTransport, Request, TransportState, settle};

/// Holding-register transport over a serial port.
pub struct ModbusRtuTransport {
    config: ModbusRtuConfig,
    context: Mutex<Option<Context>>,
    state: TransportState,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl ModbusRtuTransport {
    /// Transport for `config`. Does not open the port.
    pub fn new(config: ModbusRtuConfig) -> Self {
        Self {
            config,
            context: Mutex::new(None),
            state: TransportState::Disconnected,
        }
    }

    /// Transport on `port` at 9600 8N1, unit 1.
    pub fn simple(port: impl Into<String>) -> Self {
        Self::new(ModbusRtuConfig::new(port))
    }

    /// Settings in use.
    pub fn config(&self) -> &ModbusRtuConfig {
        &self.config
    }

    /// Serial device path.
    pub fn port(&self) -> &str {
        &self.config.port
    }

    fn open_error(&self, error: tokio_serial::Error) -> ModbusError {
        let port = &self.config.port;
        let error = match error.kind {
            tokio_serial::ErrorKind::NoDevice
            | tokio_serial::ErrorKind::Io(io::ErrorKind::NotFound) => {
                ConnectionError::serial_not_found(port)
            }
            tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                ConnectionError::serial_access_denied(port)
            }
            _ => ConnectionError::serial_config(port, error.to_string()),
        };
        ModbusError::connection(error)
    }

    /// A port that vanished mid-session is reported as such.
    fn classify_io(&self, error: &io::Error) -> Option<ModbusError> {
        let port = &self.config.port;
        match error.kind() {
            io::ErrorKind::NotFound => {
                Some(ModbusError::connection(ConnectionError::serial_not_found(port)))
            }
            io::ErrorKind::PermissionDenied => {
                Some(ModbusError::connection(ConnectionError::serial_access_denied(port)))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ModbusTransport for ModbusRtuTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        let opened = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(self.config.data_bits.into())
            .parity(self.config.parity.into())
            .stop_bits(self.config.stop_bits.into())
            .open_native_async();

        let serial = match opened {
            Ok(serial) => serial,
            Err(e) => {
                self.state = TransportState::Error;
                return Err(self.open_error(e));
            }
        };

        *self.context.lock().await = Some(rtu::attach_slave(serial, Slave(self.config.unit_id)));
        self.state = TransportState::Connected;
        tracing::info!(
            port = %self.config.port,
            line = %self.config.line_settings(),
            unit_id = self.config.unit_id,
            "Connected to tunnel device"
        );
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut context) = self.context.lock().await.take() {
            if let Err(e) = context.disconnect().await {
                tracing::warn!(error = %e, "Serial disconnect failed");
            }
        }
        self.state = TransportState::Disconnected;
        tracing::debug!(port = %self.config.port, "Disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.timeout;
        let mut slot = self.context.lock().await;
        let context = slot.as_mut().ok_or_else(ModbusError::not_connected)?;

        let reply = timeout(deadline, context.read_holding_registers(address, count)).await;
        settle(reply, Request::read(address, count), deadline, |e| self.classify_io(e))
    }

    async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        let deadline = self.config.timeout;
        let mut slot = self.context.lock().await;
        let context = slot.as_mut().ok_or_else(ModbusError::not_connected)?;

        let reply = timeout(deadline, context.write_single_register(address, value)).await;
        settle(reply, Request::write_single(address), deadline, |e| self.classify_io(e))
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let deadline = self.config.timeout;
        let mut slot = self.context.lock().await;
        let context = slot.as_mut().ok_or_else(ModbusError::not_connected)?;

        let reply = timeout(deadline, context.write_multiple_registers(address, values)).await;
        let request = Request::write_multiple(address, values.len());
        settle(reply, request, deadline, |e| self.classify_io(e))
    }

    fn unit_id(&self) -> u8 {
        self.config.unit_id
    }

    fn display_name(&self) -> String {
        format!(
            "Modbus RTU {} @{}bps (unit {})",
            self.config.port, self.config.baud_rate, self.config.unit_id
        )
    }
}

impl std::fmt::Debug for ModbusRtuTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusRtuTransport")
            .field("port", &self.config.port)
            .field("line", &self.config.line_settings())
            .field("unit_id", &self.config.unit_id)
            .field("state", &self.state)
            .finish()
    }
}
