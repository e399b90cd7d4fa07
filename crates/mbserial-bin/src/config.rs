// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 2. Parse YAML, TOML or JSON, chosen by file extension
//! 3. Apply `MBSERIAL_*` environment overrides
//! 4. Validate transport and tunnel sections
//!
//! # Example
//!
//! ```yaml
//! transport:
//!   type: tcp
//!   host: ${TUNNEL_HOST:192.168.1.50}
//!   port: 502
//!   unit_id: 1
//!
//! tunnel:
//!   layout: rx_tx
//!   poll_interval: 20ms
//!   retry:
//!     max_retries: 3
//!     strategy:
//!       kind: fixed
//!       delay: 100ms
//!
//! logging:
//!   level: info
//!   format: text
//! ```
//!
//! # Environment Overrides
//!
//! ```text
//! MBSERIAL_LAYOUT=input_output
//! MBSERIAL_UNIT_ID=7
//! MBSERIAL_POLL_INTERVAL=100ms
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mbserial_modbus::{ModbusConfig, TunnelConfig};
use mbserial_protocol::Layout;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::LogFormat;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File does not exist.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Content could not be deserialized.
    #[error("Deserialization failed: {message}")]
    Serialization {
        /// Parser message.
        message: String,
    },

    /// Extension is not yaml, yml, toml or json.
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The offending extension.
        extension: String,
    },

    /// An environment override could not be applied.
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Parsed configuration is not usable.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] mbserial_modbus::ModbusError),
}

impl ConfigError {
    fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    fn invalid_env_var(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// How to reach the tunnel device.
    pub transport: ModbusConfig,

    /// Tunnel behaviour.
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Log settings; command-line flags take precedence.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a configuration with default tunnel and logging sections.
    pub fn new(transport: impl Into<ModbusConfig>) -> Self {
        Self {
            transport: transport.into(),
            tunnel: TunnelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validates the transport and tunnel sections.
    pub fn validate(&self) -> ConfigResult<()> {
        self.transport.validate()?;
        self.tunnel.validate()?;
        Ok(())
    }

    /// Settings that are legal but probably not intended.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tunnel.poll_interval < self.transport.timeout() / 10 {
            warnings.push(format!(
                "poll_interval {} is far below the bus timeout {}",
                humantime::format_duration(self.tunnel.poll_interval),
                humantime::format_duration(self.transport.timeout())
            ));
        }
        if self.tunnel.retry.max_retries == 0 {
            warnings.push("Retries are disabled; every bus error ends the cycle".to_string());
        }
        if self.tunnel.layout == Layout::InputOutput && self.transport.is_rtu() {
            warnings.push(
                "The input_output layout has no baud-rate register; set the device rate out of band"
                    .to_string(),
            );
        }

        warnings
    }
}

/// The `logging` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level name (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Loads and validates [`AppConfig`] files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `MBSERIAL` prefix and env resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: "MBSERIAL".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Prefix of the override variables, `MBSERIAL` by default.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Turns `${VAR}` substitution and overrides on or off.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Reads, parses, overrides and validates the file at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let format = ConfigFormat::from_path(path)?;
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(&content)
        } else {
            content
        };

        let config = self
            .finish(parse_str(&content, format))
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::Parse {
                    path: path.to_path_buf(),
                    message,
                },
                other => other,
            })?;

        debug!(
            endpoint = %config.transport.endpoint(),
            layout = %config.tunnel.layout,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Like [`ConfigLoader::load`] for text already in memory.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<AppConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        self.finish(parse_str(&content, format))
    }

    fn finish(&self, parsed: ConfigResult<AppConfig>) -> ConfigResult<AppConfig> {
        let mut config = parsed?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// An unset variable without a default is left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(open) = rest.find("${") {
            out.push_str(&rest[..open]);
            let body = &rest[open + 2..];
            let Some(close) = body.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let (name, fallback) = match body[..close].split_once(':') {
                Some((name, fallback)) => (name, Some(fallback)),
                None => (&body[..close], None),
            };
            match env::var(name) {
                Ok(value) => out.push_str(&value),
                Err(_) => match fallback {
                    Some(fallback) => out.push_str(fallback),
                    None => {
                        warn!(variable = name, "Unset variable left in configuration");
                        out.push_str(&rest[open..open + close + 3]);
                    }
                },
            }
            rest = &body[close + 1..];
        }

        out.push_str(rest);
        out
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        let name = format!("{}_LAYOUT", self.env_prefix);
        if let Ok(value) = env::var(&name) {
            config.tunnel.layout = value
                .parse::<Layout>()
                .map_err(|e| ConfigError::invalid_env_var(&name, e.to_string()))?;
        }

        let name = format!("{}_UNIT_ID", self.env_prefix);
        if let Ok(value) = env::var(&name) {
            let unit_id: u8 = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(&name, "expected 1-247"))?;
            match &mut config.transport {
                ModbusConfig::Tcp(tcp) => tcp.unit_id = unit_id,
                ModbusConfig::Rtu(rtu) => rtu.unit_id = unit_id,
            }
        }

        let name = format!("{}_POLL_INTERVAL", self.env_prefix);
        if let Ok(value) = env::var(&name) {
            config.tunnel.poll_interval = humantime::parse_duration(&value)
                .map_err(|e| ConfigError::invalid_env_var(&name, e.to_string()))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// File syntaxes understood by [`ConfigLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension, case-insensitive.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "" => Err(ConfigError::UnsupportedFormat {
                extension: "(none)".to_string(),
            }),
            _ => Err(ConfigError::UnsupportedFormat { extension }),
        }
    }
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// [`ConfigLoader::load`] with the `MBSERIAL` prefix.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    ConfigLoader::new().load(path)
}
