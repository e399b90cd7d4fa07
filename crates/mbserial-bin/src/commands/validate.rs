// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::{AppConfig, load_config};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = load_config(config_path)
        .map_err(|e| BinError::config(format!("Configuration validation failed: {}", e)))?;
    let warnings = config.warnings();

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("{}", summary(&config));

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": config.transport.endpoint(),
                    "unit_id": config.transport.unit_id(),
                    "layout": config.tunnel.layout,
                    "poll_interval": humantime::format_duration(config.tunnel.poll_interval).to_string(),
                    "max_retries": config.tunnel.retry.max_retries,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Failed to render result: {}", e)))?;
            println!("{}", rendered);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

fn summary(config: &AppConfig) -> String {
    let map = config.tunnel.layout.register_map();
    format!(
        "Summary:\n  Transport: {}\n  Unit ID: {}\n  Layout: {} (receive {}, transmit {})\n  Poll interval: {}\n  Retries: {}",
        config.transport.endpoint(),
        config.transport.unit_id(),
        config.tunnel.layout,
        map.receive,
        map.transmit,
        humantime::format_duration(config.tunnel.poll_interval),
        config.tunnel.retry.max_retries,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli_for(file: &NamedTempFile, extra: &[&str]) -> (Cli, ValidateArgs) {
        let path = file.path().to_str().unwrap().to_string();
        let mut argv = vec!["mbserial", "-c", path.as_str(), "validate"];
        argv.extend_from_slice(extra);
        let cli = Cli::parse_from(argv);
        let args = match cli.effective_command() {
            crate::cli::Commands::Validate(args) => args,
            other => panic!("unexpected command {:?}", other),
        };
        (cli, args)
    }

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validate_ok() {
        let file = config_file(r#"{"transport": {"type": "tcp", "host": "10.0.0.2"}}"#);
        let (cli, args) = cli_for(&file, &[]);
        assert!(validate(&cli, args).is_ok());
    }

    #[test]
    fn test_validate_strict_fails_on_warnings() {
        let file = config_file(
            r#"{"transport": {"type": "tcp", "host": "10.0.0.2"}, "tunnel": {"retry": {"max_retries": 0}}}"#,
        );
        let (cli, args) = cli_for(&file, &["--strict", "-f", "json"]);
        let err = validate(&cli, args).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_validate_rejects_invalid() {
        let file = config_file(r#"{"transport": {"type": "tcp", "host": ""}}"#);
        let (cli, args) = cli_for(&file, &[]);
        assert!(validate(&cli, args).is_err());
    }

    #[test]
    fn test_summary_mentions_windows() {
        let config: AppConfig = serde_json::from_str(
            r#"{"transport": {"type": "rtu", "port": "/dev/ttyS1"}, "tunnel": {"layout": "input_output"}}"#,
        )
        .unwrap();
        let text = summary(&config);
        assert!(text.contains("rtu:///dev/ttyS1"));
        assert!(text.contains("input_output"));
        assert!(text.contains("1002..=1065"));
    }
}
