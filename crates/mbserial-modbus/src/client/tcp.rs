// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus TCP transport, for tunnel devices behind a gateway.
//!
//! ```rust,ignore
//! use mbserial_modbus::client::{ModbusTcpTransport, ModbusTransport};
//! use mbserial_modbus::types::ModbusTcpConfig;
//!
//! let mut transport = ModbusTcpTransport::new(ModbusTcpConfig::new("192.168.1.100"));
//! transport.connect().await?;
//! let status = transport.read_holding_registers(1000, 1).await?;
//! ```

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::prelude::*;

use crate::error::{ConnectionError, ModbusError, ModbusResult};
use crate::types::ModbusTcpConfig;

use super::transport::{ModbusTransport, Request, TransportState, settle};

/// Holding-register transport over a TCP socket.
pub struct ModbusTcpTransport {
    config: ModbusTcpConfig,
    context: Mutex<Option<Context>>,
    state: TransportState,
}

impl ModbusTcpTransport {
    /// Transport for `config`. Does not connect.
    pub fn new(config: ModbusTcpConfig) -> Self {
        Self {
            config,
            context: Mutex::new(None),
            state: TransportState::Disconnected,
        }
    }

    /// Transport for `host:port` with default timeouts and unit 1.
    pub fn simple(host: impl Into<String>, port: u16) -> Self {
        Self::new(ModbusTcpConfig::with_port(host, port))
    }

    /// Settings in use.
    pub fn config(&self) -> &ModbusTcpConfig {
        &self.config
    }

    async fn resolve(&self) -> ModbusResult<SocketAddr> {
        let target = self.config.socket_addr();
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let lookup_failed =
            |source| ModbusError::connection(ConnectionError::dns_failed(&self.config.host, source));
        tokio::net::lookup_host(&target)
            .await
            .map_err(|e| lookup_failed(Some(e)))?
            .next()
            .ok_or_else(|| lookup_failed(None))
    }

    async fn open(&self) -> ModbusResult<Context> {
        let addr = self.resolve().await?;
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                ModbusError::connection(ConnectionError::timed_out(
                    &self.config.host,
                    self.config.port,
                    self.config.connect_timeout,
                ))
            })?
            .map_err(|e| {
                ModbusError::connection(ConnectionError::refused_with(
                    &self.config.host,
                    self.config.port,
                    e,
                ))
            })?;

        if let Err(e) = stream.set_nodelay(self.config.tcp_nodelay) {
            tracing::debug!(error = %e, "Could not set TCP_NODELAY");
        }
        Ok(tcp::attach_slave(stream, Slave(self.config.unit_id)))
    }

    /// Refusals name the gateway; everything else uses the shared mapping.
    fn classify_io(&self, error: &io::Error) -> Option<ModbusError> {
        (error.kind() == io::ErrorKind::ConnectionRefused).then(|| {
            ModbusError::connection(ConnectionError::Refused {
                host: self.config.host.clone(),
                port: self.config.port,
                source: Some(io::Error::new(error.kind(), error.to_string())),
            })
        })
    }
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn connect(&mut self) -> ModbusResult<()> {
        if self.state.is_connected() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        match self.open().await {
            Ok(context) => {
                *self.context.lock().await = Some(context);
                self.state = TransportState::Connected;
                tracing::info!(
                    gateway = %self.config.socket_addr(),
                    unit_id = self.config.unit_id,
                    "Connected to tunnel device"
                );
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Error;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        if let Some(mut context) = self.context.lock().await.take() {
            if let Err(e) = context.disconnect().await {
                tracing::warn!(error = %e, "Gateway disconnect failed");
            }
        }
        self.state = TransportState::Disconnected;
        tracing::debug!(gateway = %self.config.socket_addr(), "Disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let deadline = self.config.operation_timeout;
        let mut slot = self.context.lock().await;
        let context = slot.as_mut().ok_or_else(ModbusError::not_connected)?;

        let reply = timeout(deadline, context.read_holding_registers(address, count)).await;
        settle(reply, Request::read(address, count), deadline, |e| self.classify_io(e))
    }

    async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        let deadline = self.config.operation_timeout;
        let mut slot = self.context.lock().await;
        let context = slot.as_mut().ok_or_else(ModbusError::not_connected)?;

        let reply = timeout(deadline, context.write_single_register(address, value)).await;
        settle(reply, Request::write_single(address), deadline, |e| self.classify_io(e))
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let deadline = self.config.operation_timeout;
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
        format!("Modbus TCP {} (unit {})", self.config.socket_addr(), self.config.unit_id)
    }
}

impl std::fmt::Debug for ModbusTcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpTransport")
            .field("gateway", &self.config.socket_addr())
            .field("unit_id", &self.config.unit_id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_constructor() {
        let transport = ModbusTcpTransport::simple("10.0.0.5", 5020);
        assert_eq!(transport.config().socket_addr(), "10.0.0.5:5020");
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
        assert_eq!(transport.unit_id(), 1);
    }

    #[test]
    fn test_display_name() {
        let transport = ModbusTcpTransport::simple("device.local", 502);
        assert_eq!(transport.display_name(), "Modbus TCP device.local:502 (unit 1)");
        assert!(format!("{transport:?}").contains("device.local"));
    }

    #[tokio::test]
    async fn test_requests_require_connection() {
        let transport = ModbusTcpTransport::simple("127.0.0.1", 502);
        let err = transport.read_holding_registers(1000, 1).await.unwrap_err();
        assert!(matches!(err, ModbusError::Connection(ConnectionError::NotConnected)));
    }

    #[test]
    fn test_refusal_names_gateway() {
        let transport = ModbusTcpTransport::simple("127.0.0.1", 1502);
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = transport.classify_io(&refused);
        assert!(matches!(
            err,
            Some(ModbusError::Connection(ConnectionError::Refused { port: 1502, .. }))
        ));

        let other = io::Error::new(io::ErrorKind::InvalidData, "garbage");
        assert!(transport.classify_io(&other).is_none());
    }
}
