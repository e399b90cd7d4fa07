// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line of `mbserial`.
//!
//! ```text
//! mbserial [-c FILE] [run]     bridge stdin/stdout (default)
//! mbserial validate            check FILE without touching the bus
//! mbserial status              decode the status register once
//! mbserial version
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::LoggingConfig;

/// Bridges a byte stream to the serial port of a Modbus tunnel device.
#[derive(Parser, Debug)]
#[command(
    name = "mbserial",
    author = "Sylvex <contact@sylvex.io>",
    version = mbserial_modbus::VERSION,
    about = "Serial-over-Modbus register tunnel bridge",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Path of the YAML, TOML or JSON configuration
    #[arg(
        short,
        long,
        default_value = "mbserial.yaml",
        env = "MBSERIAL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Tracing filter, e.g. `debug` or `mbserial_modbus=trace`
    #[arg(short, long, env = "MBSERIAL_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log line format
    #[arg(long, env = "MBSERIAL_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Bridge stdin/stdout through the tunnel
    ///
    /// Bytes read from stdin go out of the device's serial port and bytes
    /// arriving on it are written to stdout, until Ctrl+C or SIGTERM.
    Run(RunArgs),

    /// Check the configuration file
    Validate(ValidateArgs),

    /// Decode the device's status register
    Status(StatusArgs),

    /// Print build details
    Version,
}

/// `run` options.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Set the device's serial data rate before bridging (Rx/Tx layout only)
    #[arg(short, long)]
    pub baud_rate: Option<u32>,

    /// Stop once stdin is closed and everything read from it has been sent
    #[arg(long)]
    pub exit_on_eof: bool,
}

/// `validate` options.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Print the configuration as loaded
    #[arg(short, long)]
    pub show_config: bool,

    /// Result format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Fail on warnings too
    #[arg(long)]
    pub strict: bool,
}

/// `status` options.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Give up after this many seconds
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,
}

impl Default for StatusArgs {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            timeout: 10,
        }
    }
}

/// Log line format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field text
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Single-line text
    Compact,
}

/// Format of command output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// For people
    #[default]
    Text,
    /// For scripts
    Json,
}

impl Cli {
    /// Parses `std::env::args`, exiting on bad input.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand, `run` when none was given.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// `--verbose` without `--quiet`.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Merges the logging flags over the config file's `logging` section.
    ///
    /// `--quiet` and `--verbose` win over everything, then explicit
    /// `--log-level`/`--log-format`, then the file.
    pub fn effective_logging(&self, file: Option<&LoggingConfig>) -> LoggingConfig {
        let base = file.cloned().unwrap_or_default();

        let level = if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone().unwrap_or(base.level)
        };

        LoggingConfig {
            level,
            format: self.log_format.unwrap_or(base.format),
        }
    }
}
