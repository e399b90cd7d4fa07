// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Failures of the `mbserial` process and the exit codes they map to.
//!
//! | code | cause                                   |
//! |------|-----------------------------------------|
//! | 1    | bad or unreadable configuration         |
//! | 2    | startup failed                          |
//! | 3    | bridge failed while running             |
//! | 4    | local stdin/stdout failure              |
//! | 5    | device unreachable or not answering     |
//! | 6    | device answered with something unusable |

use mbserial_modbus::ModbusError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result of a command.
pub type BinResult<T> = Result<T, BinError>;

/// Anything that ends a command early.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Startup failed.
    #[error("startup failed: {0}")]
    Initialization(String),

    /// Failure while running.
    #[error("{0}")]
    Runtime(String),

    /// Local stream failure.
    #[error("stdio: {0}")]
    Io(String),

    /// Configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Device or tunnel failure.
    #[error(transparent)]
    Modbus(#[from] ModbusError),

    /// Another error with a note on what was being done.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// What went wrong.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Configuration rejected.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Startup failed.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Failure while running.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Local stream failure.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Prefixes the message with `context`.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through [`BinError::WithContext`].
    pub fn root(&self) -> &BinError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code, see the module table.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Initialization(_) => 2,
            Self::Runtime(_) | Self::WithContext { .. } => 3,
            Self::Io(_) => 4,
            Self::Modbus(e) => match e.category() {
                "connection" | "timeout" => 5,
                "configuration" => 1,
                _ => 6,
            },
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Prints `error`, its causes and any recovery hints to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("error: {error}");

    let mut cause = std::error::Error::source(error);
    while let Some(inner) = cause {
        eprintln!("  caused by: {inner}");
        cause = inner.source();
    }

    if let BinError::Modbus(e) = error.root() {
        eprintln!("  code: {}", e.error_code());
        for hint in e.recovery_hints() {
            eprintln!("  hint: {hint}");
        }
    }
}

/// [`report_error`] then exit with [`BinError::exit_code`].
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_messages() {
        assert_eq!(
            BinError::config("missing transport").to_string(),
            "invalid configuration: missing transport"
        );
        let err = BinError::runtime("stdin closed").with_context("bridge");
        assert_eq!(err.to_string(), "bridge: stdin closed");
    }

    #[test]
    fn test_context_keeps_exit_code() {
        let err = BinError::from(ModbusError::not_connected()).with_context("bridge stopped");
        assert_eq!(err.exit_code(), 5);
        assert!(matches!(err.root(), BinError::Modbus(_)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("x").exit_code(), 1);
        assert_eq!(BinError::init("x").exit_code(), 2);
        assert_eq!(BinError::runtime("x").exit_code(), 3);
        assert_eq!(BinError::io("x").exit_code(), 4);
        assert_eq!(
            BinError::from(ModbusError::read_timeout(Duration::from_secs(1))).exit_code(),
            5
        );
        assert_eq!(BinError::from(ModbusError::exception(0x03, 0x02)).exit_code(), 6);
    }

    #[test]
    fn test_io_conversion() {
        let err = BinError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "stdio: pipe");
    }
}
