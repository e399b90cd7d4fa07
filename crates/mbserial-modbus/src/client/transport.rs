// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The holding-register transport seam.
//!
//! The tunnel needs three function codes and nothing else, so that is all
//! [`ModbusTransport`] carries. Addresses at this level are 0-origin wire
//! addresses; [`RegisterClient`](super::RegisterClient) translates from
//! register ids.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::error::Elapsed;
use tokio_modbus::ExceptionCode;

use crate::error::{
    ConnectionError, ModbusError, ModbusResult, OperationError, ProtocolError, TimeoutError,
};

/// Read Holding Registers.
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Write Single Register.
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Write Multiple Registers.
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Where a transport is in its connect/disconnect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Not connected.
    #[default]
    Disconnected,
    /// `connect` in progress.
    Connecting,
    /// Ready for requests.
    Connected,
    /// The last `connect` failed.
    Error,
}

impl TransportState {
    /// Whether requests can be sent.
    #[inline]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        })
    }
}

/// Holding-register access over TCP or RTU.
///
/// Requests take `&self`; implementations serialise access to the bus.
#[async_trait]
pub trait ModbusTransport: Send + Sync {
    /// Opens the connection. Connecting twice is a no-op.
    async fn connect(&mut self) -> ModbusResult<()>;

    /// Closes the connection.
    async fn disconnect(&mut self) -> ModbusResult<()>;

    /// Whether requests can be issued.
    fn is_connected(&self) -> bool;

    /// Current state.
    fn state(&self) -> TransportState;

    /// FC03 starting at `address`.
    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>>;

    /// FC06 at `address`.
    async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()>;

    /// FC16 starting at `address`.
    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()>;

    /// Unit id requests are addressed to.
    fn unit_id(&self) -> u8;

    /// Human-readable endpoint.
    fn display_name(&self) -> String;
}

/// One request on the wire, kept to label whatever goes wrong with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Request {
    pub function_code: u8,
    pub address: u16,
    pub count: u16,
}

impl Request {
    pub(crate) fn read(address: u16, count: u16) -> Self {
        Self {
            function_code: FC_READ_HOLDING_REGISTERS,
            address,
            count,
        }
    }

    pub(crate) fn write_single(address: u16) -> Self {
        Self {
            function_code: FC_WRITE_SINGLE_REGISTER,
            address,
            count: 1,
        }
    }

    pub(crate) fn write_multiple(address: u16, count: usize) -> Self {
        Self {
            function_code: FC_WRITE_MULTIPLE_REGISTERS,
            address,
            count: count as u16,
        }
    }

    fn is_read(&self) -> bool {
        self.function_code == FC_READ_HOLDING_REGISTERS
    }

    fn timed_out(&self, deadline: Duration) -> ModbusError {
        if self.is_read() {
            ModbusError::read_timeout(deadline)
        } else {
            ModbusError::write_timeout(deadline)
        }
    }

    fn failed(&self, error: io::Error) -> ModbusError {
        ModbusError::operation(if self.is_read() {
            OperationError::read_failed(self.address, self.count, error)
        } else {
            OperationError::write_failed(self.address, error)
        })
    }
}

/// Turns the outcome of a timed tokio-modbus call into a [`ModbusResult`].
///
/// `classify` gets first pick at transport I/O errors so each transport can
/// attach its own endpoint; whatever it declines goes through the shared
/// mapping.
pub(crate) fn settle<T>(
    reply: Result<tokio_modbus::Result<T>, Elapsed>,
    request: Request,
    deadline: Duration,
    classify: impl FnOnce(&io::Error) -> Option<ModbusError>,
) -> ModbusResult<T> {
    let result = match reply {
        Err(_) => Err(request.timed_out(deadline)),
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(exception))) => Err(map_exception(request.function_code, exception)),
        Ok(Err(tokio_modbus::Error::Protocol(e))) => {
            Err(ModbusError::protocol(ProtocolError::unexpected(e.to_string())))
        }
        Ok(Err(tokio_modbus::Error::Transport(e))) => Err(classify(&e)
            .or_else(|| map_common_io(&e, deadline))
            .unwrap_or_else(|| request.failed(e))),
    };

    if let Err(e) = &result {
        tracing::debug!(
            function_code = request.function_code,
            address = request.address,
            count = request.count,
            error = %e,
            "Register request failed"
        );
    }
    result
}

fn exception_code_to_u8(code: ExceptionCode) -> u8 {
    match code {
        ExceptionCode::IllegalFunction => 0x01,
        ExceptionCode::IllegalDataAddress => 0x02,
        ExceptionCode::IllegalDataValue => 0x03,
        ExceptionCode::ServerDeviceFailure => 0x04,
        ExceptionCode::Acknowledge => 0x05,
        ExceptionCode::ServerDeviceBusy => 0x06,
        ExceptionCode::MemoryParityError => 0x08,
        ExceptionCode::GatewayPathUnavailable => 0x0A,
        ExceptionCode::GatewayTargetDevice => 0x0B,
        _ => 0xFF,
    }
}

fn map_exception(function_code: u8, exception: ExceptionCode) -> ModbusError {
    ModbusError::exception(function_code, exception_code_to_u8(exception))
}

fn map_common_io(error: &io::Error, deadline: Duration) -> Option<ModbusError> {
    let mapped = match error.kind() {
        io::ErrorKind::TimedOut => ModbusError::timeout(TimeoutError::response(deadline)),
        io::ErrorKind::NotConnected => ModbusError::not_connected(),
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => {
            ModbusError::connection(ConnectionError::closed(Some(error.to_string())))
        }
        _ => return None,
    };
    Some(mapped)
}
