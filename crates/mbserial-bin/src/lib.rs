// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `mbserial` command: configuration, logging and the stdio bridge
//! around [`mbserial_modbus::SerialTunnel`].
//!
//! ```text
//! main ─► cli ─► commands ─┬─► runtime ─► SerialTunnel
//!                          │      └─ shutdown
//!                          └─► config, logging
//! ```
//!
//! ```bash
//! mbserial -c tunnel.yaml                 # bridge stdin/stdout
//! mbserial run --baud-rate 115200         # program the port rate first
//! mbserial validate --strict
//! mbserial status -f json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use config::{AppConfig, ConfigError, ConfigLoader, LoggingConfig, load_config};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{BridgeOptions, BridgeRuntime, RuntimeBuilder, run_bridge};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
