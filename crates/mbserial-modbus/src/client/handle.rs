// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport selected at runtime from a [`ModbusConfig`].

use async_trait::async_trait;

use crate::error::ModbusResult;
use crate::types::ModbusConfig;

use super::rtu::ModbusRtuTransport;
use super::tcp::ModbusTcpTransport;
use super::transport::{ModbusTransport, TransportState};

/// Either a TCP or an RTU transport.
#[derive(Debug)]
pub enum TransportHandle {
    /// TCP transport.
    Tcp(ModbusTcpTransport),
    /// RTU transport.
    Rtu(ModbusRtuTransport),
}

impl TransportHandle {
    /// Builds the transport described by `config`. Does not connect.
    pub fn from_config(config: &ModbusConfig) -> Self {
        match config {
            ModbusConfig::Tcp(c) => Self::Tcp(ModbusTcpTransport::new(c.clone())),
            ModbusConfig::Rtu(c) => Self::Rtu(ModbusRtuTransport::new(c.clone())),
        }
    }
}

impl From<ModbusTcpTransport> for TransportHandle {
    fn from(transport: ModbusTcpTransport) -> Self {
        Self::Tcp(transport)
    }
}

impl From<ModbusRtuTransport> for TransportHandle {
    fn from(transport: ModbusRtuTransport) -> Self {
        Self::Rtu(transport)
    }
}

#[async_trait]
impl ModbusTransport for TransportHandle {
    async fn connect(&mut self) -> ModbusResult<()> {
        match self {
            Self::Tcp(t) => t.connect().await,
            Self::Rtu(t) => t.connect().await,
        }
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        match self {
            Self::Tcp(t) => t.disconnect().await,
            Self::Rtu(t) => t.disconnect().await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Tcp(t) => t.is_connected(),
            Self::Rtu(t) => t.is_connected(),
        }
    }

    fn state(&self) -> TransportState {
        match self {
            Self::Tcp(t) => t.state(),
            Self::Rtu(t) => t.state(),
        }
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        match self {
            Self::Tcp(t) => t.read_holding_registers(address, count).await,
            Self::Rtu(t) => t.read_holding_registers(address, count).await,
        }
    }

    async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        match self {
            Self::Tcp(t) => t.write_single_register(address, value).await,
            Self::Rtu(t) => t.write_single_register(address, value).await,
        }
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        match self {
            Self::Tcp(t) => t.write_multiple_registers(address, values).await,
            Self::Rtu(t) => t.write_multiple_registers(address, values).await,
        }
    }

    fn unit_id(&self) -> u8 {
        match self {
            Self::Tcp(t) => t.unit_id(),
            Self::Rtu(t) => t.unit_id(),
        }
    }

    fn display_name(&self) -> String {
        match self {
            Self::Tcp(t) => t.display_name(),
            Self::Rtu(t) => t.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModbusRtuConfig, ModbusTcpConfig};

    #[test]
    fn test_from_config() {
        let tcp = TransportHandle::from_config(&ModbusTcpConfig::with_port("10.1.1.1", 1502).into());
        assert!(matches!(tcp, TransportHandle::Tcp(_)));
        assert_eq!(tcp.display_name(), "Modbus TCP 10.1.1.1:1502 (unit 1)");

        let rtu = TransportHandle::from_config(&ModbusRtuConfig::new("/dev/ttyS0").into());
        assert!(matches!(rtu, TransportHandle::Rtu(_)));
        assert_eq!(rtu.state(), TransportState::Disconnected);
    }
}
