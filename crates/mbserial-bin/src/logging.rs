// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tracing setup. Everything is written to stderr because `run` owns stdout.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::cli::LogFormat;
use crate::config::LoggingConfig;

/// Targets that log every frame at debug level.
const NOISY_TARGETS: &[&str] = &["tokio_modbus", "tokio_serial", "mio_serial"];

/// Installs the global subscriber. `RUST_LOG` wins over `config.level`.
///
/// Only the first call has an effect.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let ansi = std::io::stderr().is_terminal();
    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true)
            .boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}

/// Filter for a configured level.
///
/// A bare level name also pins the Modbus and serial stacks to `warn`.
/// Anything else is taken as a ready-made filter.
pub fn filter_directives(level: &str) -> String {
    let Some(level) = parse_level(level) else {
        return level.to_string();
    };
    let mut directives = level.as_str().to_lowercase();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// A level name, case-insensitive. `warning` is accepted for `warn`.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" Info "), Some(Level::INFO));
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_plain_level_quiets_bus_stack() {
        let directives = filter_directives("Debug");
        assert_eq!(
            directives,
            "debug,tokio_modbus=warn,tokio_serial=warn,mio_serial=warn"
        );
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_custom_filter_passes_through() {
        let directives = filter_directives("info,mbserial_modbus=trace");
        assert_eq!(directives, "info,mbserial_modbus=trace");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
