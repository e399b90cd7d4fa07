// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `status` command.

use std::time::{Duration, Instant};

use mbserial_modbus::{ModbusTransport, SerialTunnel, TransportHandle};
use mbserial_protocol::{Layout, RegisterMap, StatusWord};
use serde::Serialize;

use crate::cli::{Cli, OutputFormat, StatusArgs};
use crate::config::load_config;
use crate::error::{BinError, BinResult};

/// Decoded status register plus device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Transport endpoint.
    pub endpoint: String,
    /// Register layout.
    pub layout: Layout,
    /// Raw status word.
    pub raw: u16,
    /// Serial link up.
    pub connected: bool,
    /// Characters waiting for the host.
    pub receive_available: u8,
    /// Characters of transmit room.
    pub transmit_available: u8,
    /// Transmit buffer drained; absent on layouts without the flag.
    pub transmit_empty: Option<bool>,
    /// Configured serial data rate; absent on layouts without the register.
    pub baud_rate: Option<u32>,
    /// Time taken to collect the report.
    pub latency_ms: u64,
}

impl StatusReport {
    /// Builds a report from a status word read through `map`.
    pub fn new(endpoint: impl Into<String>, map: &RegisterMap, word: StatusWord) -> Self {
        Self {
            endpoint: endpoint.into(),
            layout: map.layout,
            raw: word.bits(),
            connected: word.is_connected(),
            receive_available: word.receive_available(),
            transmit_available: word.transmit_available(),
            transmit_empty: map.transmit_empty(word),
            baud_rate: None,
            latency_ms: 0,
        }
    }

    /// Renders the report as human-readable text.
    pub fn to_text(&self) -> String {
        let mut lines = vec![
            format!("Tunnel status ({}, {})", self.endpoint, self.layout),
            format!("  Status word:  0x{:04X}", self.raw),
            format!(
                "  Serial link:  {}",
                if self.connected { "connected" } else { "disconnected" }
            ),
            format!("  Receive:      {} chars waiting", self.receive_available),
            format!("  Transmit:     {} chars free", self.transmit_available),
        ];
        if let Some(empty) = self.transmit_empty {
            lines.push(format!(
                "  Tx buffer:    {}",
                if empty { "empty" } else { "draining" }
            ));
        }
        if let Some(baud_rate) = self.baud_rate {
            lines.push(format!("  Data rate:    {} baud", baud_rate));
        }
        lines.push(format!("  Latency:      {}ms", self.latency_ms));
        lines.join("\n")
    }
}

/// Executes the `status` command: one status read, printed and decoded.
pub async fn status(cli: &Cli, args: StatusArgs) -> BinResult<()> {
    let config = load_config(&cli.config)?;
    let tunnel = SerialTunnel::new(
        TransportHandle::from_config(&config.transport),
        config.tunnel.clone(),
    )?;
    let endpoint = config.transport.endpoint();
    let timeout = Duration::from_secs(args.timeout);

    let report = tokio::time::timeout(timeout, collect(&tunnel, endpoint))
        .await
        .map_err(|_| BinError::runtime(format!("No answer within {}s", args.timeout)))??;

    match args.format {
        OutputFormat::Text => println!("{}", report.to_text()),
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::runtime(format!("Failed to render report: {}", e)))?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

async fn collect<T: ModbusTransport>(
    tunnel: &SerialTunnel<T>,
    endpoint: String,
) -> BinResult<StatusReport> {
    let start = Instant::now();
    tunnel.connect().await?;

    let word = tunnel.status().await?;
    let mut report = StatusReport::new(endpoint, tunnel.register_map(), word);

    if tunnel.register_map().baud_rate.is_some() {
        report.baud_rate = Some(tunnel.baud_rate().await?);
    }
    report.latency_ms = start.elapsed().as_millis() as u64;

    if let Err(e) = tunnel.disconnect().await {
        e.log("status disconnect");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_rx_tx() {
        let map = Layout::RxTx.register_map();
        let word = StatusWord::from_bits(0x8A85);
        let mut report = StatusReport::new("tcp://10.0.0.2:502", &map, word);
        report.baud_rate = Some(115_200);

        assert!(report.connected);
        assert_eq!(report.receive_available, 5);
        assert_eq!(report.transmit_available, 0x0A);
        assert_eq!(report.transmit_empty, Some(true));

        let text = report.to_text();
        assert!(text.contains("0x8A85"));
        assert!(text.contains("Tx buffer:    empty"));
        assert!(text.contains("115200 baud"));
    }

    #[test]
    fn test_report_input_output_has_no_tx_empty() {
        let map = Layout::InputOutput.register_map();
        let report = StatusReport::new("rtu:///dev/ttyS0", &map, StatusWord::from_bits(0x0080));

        assert!(!report.connected);
        assert_eq!(report.transmit_empty, None);
        assert!(!report.to_text().contains("Tx buffer"));
    }

    #[test]
    fn test_report_json() {
        let map = Layout::RxTx.register_map();
        let report = StatusReport::new("tcp://h:502", &map, StatusWord::from_bits(0x8000));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["layout"], "rx_tx");
        assert_eq!(json["connected"], true);
        assert_eq!(json["raw"], 0x8000);
    }
}
