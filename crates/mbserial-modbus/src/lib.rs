// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus side of mbserial: transports, a register client, and the serial
//! tunnel engine that moves characters through a device's register windows.
//!
//! ```text
//! SerialTunnel        status word → window plan → pack / unpack
//!      │
//! RegisterClient      register ids → addresses, retries, counters
//!      │
//! ModbusTransport     FC03 / FC06 / FC16
//!      ├── ModbusTcpTransport   (gateway)
//!      └── ModbusRtuTransport   (serial bus)
//! ```
//!
//! ```rust,ignore
//! use mbserial_modbus::{ModbusTcpConfig, ModbusTcpTransport, SerialTunnel, TunnelConfig};
//!
//! let transport = ModbusTcpTransport::new(ModbusTcpConfig::new("192.168.1.100"));
//! let tunnel = SerialTunnel::new(transport, TunnelConfig::default())?;
//! tunnel.connect().await?;
//!
//! tunnel.transmit_all(b"AT\r\n").await?;
//! let reply = tunnel.receive().await?;
//! ```
//!
//! Failures are [`ModbusError`]s. Each knows whether it is worth retrying
//! and can log itself:
//!
//! ```rust,ignore
//! if let Err(error) = tunnel.poll(&pending).await {
//!     error.log("poll");
//!     for hint in error.recovery_hints() {
//!         eprintln!("hint: {hint}");
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod tunnel;
pub mod types;

pub use error::{
    ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, ModbusError, ModbusResult,
    OperationError, ProtocolError, TimeoutError, TunnelError,
};

pub use types::{
    DataBits, ModbusConfig, ModbusRtuConfig, ModbusTcpConfig, Parity, StopBits, TunnelConfig,
};

pub use client::{
    ClientStats, ModbusRtuTransport, ModbusTcpTransport, ModbusTransport, RegisterClient,
    RetryConfig, RetryStrategy, TransportHandle, TransportState,
};

pub use tunnel::{PollOutcome, SerialTunnel, TunnelStats, TunnelStatsSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
