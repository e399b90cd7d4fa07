// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge runtime.
//!
//! Moves bytes between a local stream pair (stdin/stdout in production)
//! and the tunnel device:
//!
//! ```text
//!   input ──► pending ──► SerialTunnel::poll ──► transmit window
//!   output ◄──────────────  received  ◄───────── receive window
//! ```
//!
//! One poll per tick of `tunnel.poll_interval`. Connection failures are
//! retried with the tunnel's retry strategy; anything else stops the bridge.

use std::path::{Path, PathBuf};

use mbserial_modbus::{ModbusTransport, SerialTunnel, TransportHandle};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, load_config};
use crate::error::{BinError, BinResult};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Bytes read from the input per read call.
const READ_CHUNK: usize = 4096;

/// Input is not read while this many bytes are still waiting to be sent.
const MAX_PENDING: usize = 64 * 1024;

/// Per-run switches from the `run` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Serial data rate to program before bridging.
    pub baud_rate: Option<u32>,
    /// Stop once the input is closed and fully transmitted.
    pub exit_on_eof: bool,
}

/// Runs the stdio bridge against the configured device.
pub struct BridgeRuntime {
    config: AppConfig,
    options: BridgeOptions,
    shutdown: ShutdownCoordinator,
}

impl BridgeRuntime {
    /// Creates a new runtime.
    pub fn new(config: AppConfig, options: BridgeOptions) -> Self {
        Self {
            config,
            options,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The shutdown coordinator; initiate it to stop the bridge.
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Bridges stdin/stdout until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            endpoint = %self.config.transport.endpoint(),
            layout = %self.config.tunnel.layout,
            "Starting mbserial bridge v{}",
            crate::VERSION
        );

        let transport = TransportHandle::from_config(&self.config.transport);
        let tunnel = SerialTunnel::new(transport, self.config.tunnel.clone())?;

        let listener = tokio::spawn({
            let coordinator = self.shutdown.clone();
            async move { coordinator.listen_for_signals().await }
        });

        let result = run_bridge(
            &tunnel,
            &self.options,
            tokio::io::stdin(),
            tokio::io::stdout(),
            self.shutdown.shutdown_signal(),
        )
        .await;

        listener.abort();
        info!("mbserial bridge stopped");
        result
    }
}

/// Bridges `input` and `output` through `tunnel` until `shutdown` fires.
///
/// Connects first and disconnects on the way out.
pub async fn run_bridge<T, R, W>(
    tunnel: &SerialTunnel<T>,
    options: &BridgeOptions,
    mut input: R,
    mut output: W,
    mut shutdown: ShutdownSignal,
) -> BinResult<()>
where
    T: ModbusTransport,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tunnel.connect().await?;
    if let Some(baud_rate) = options.baud_rate {
        tunnel.set_baud_rate(baud_rate).await?;
    }

    let poll_interval = tunnel.config().poll_interval;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pending: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut input_open = true;
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,

            read = input.read(&mut buf), if input_open && pending.len() < MAX_PENDING => {
                match read? {
                    0 => {
                        debug!(pending = pending.len(), "Input closed");
                        input_open = false;
                    }
                    n => pending.extend_from_slice(&buf[..n]),
                }
            }

            _ = ticker.tick() => {
                match tunnel.poll(&pending).await {
                    Ok(outcome) => {
                        failures = 0;
                        if !outcome.received.is_empty() {
                            output.write_all(&outcome.received).await?;
                            output.flush().await?;
                        }
                        pending.drain(..outcome.sent);

                        if options.exit_on_eof && !input_open && pending.is_empty() {
                            debug!("Input drained");
                            break;
                        }
                    }
                    Err(e) => {
                        e.log("bridge poll");
                        if !e.is_retryable() {
                            return Err(BinError::from(e).with_context("bridge stopped"));
                        }

                        let delay = tunnel.config().retry.strategy.delay(failures);
                        failures = failures.saturating_add(1);
                        warn!(
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            "Tunnel poll failed, backing off"
                        );

                        tokio::select! {
                            _ = shutdown.recv() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        if e.category() == "connection" {
                            if let Err(e) = tunnel.client().reconnect().await {
                                e.log("reconnect");
                            }
                        }
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        warn!(dropped = pending.len(), "Discarding untransmitted input");
    }

    let stats = tunnel.stats().snapshot();
    info!(
        chars_sent = stats.chars_sent,
        chars_received = stats.chars_received,
        suppressed = stats.suppressed_transmits,
        link_down = stats.link_down_events,
        "Bridge totals"
    );

    if let Err(e) = tunnel.disconnect().await {
        e.log("disconnect");
    }
    Ok(())
}

/// Builder for [`BridgeRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<AppConfig>,
    options: BridgeOptions,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Programs the device's serial data rate before bridging.
    pub fn baud_rate(mut self, baud_rate: Option<u32>) -> Self {
        self.options.baud_rate = baud_rate;
        self
    }

    /// Stops once the input is closed and drained.
    pub fn exit_on_eof(mut self, exit: bool) -> Self {
        self.options.exit_on_eof = exit;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<BridgeRuntime> {
        let config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;
                load_config(&path)?
            }
        };

        Ok(BridgeRuntime::new(config, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use mbserial_modbus::{
        ModbusResult, ModbusTcpConfig, RetryConfig, TransportState, TunnelConfig,
    };
    use mbserial_protocol::{Layout, RegisterMap, StatusWord, pack_chars};
    use tokio::io::AsyncReadExt;

    /// Device whose serial port is wired back to itself.
    #[derive(Clone)]
    struct LoopbackDevice {
        line: Arc<Mutex<VecDeque<u8>>>,
        map: RegisterMap,
        state: TransportState,
    }

    impl LoopbackDevice {
        fn new() -> Self {
            Self {
                line: Arc::new(Mutex::new(VecDeque::new())),
                map: Layout::RxTx.register_map(),
                state: TransportState::Disconnected,
            }
        }

        fn absorb(&self, address: u16, values: &[u16]) {
            let first = self.map.transmit.base().address();
            let last = self.map.transmit.last().address();
            if address < first || address > last {
                return;
            }
            let mut line = self.line.lock().unwrap();
            for (i, value) in values.iter().enumerate() {
                let [hi, lo] = value.to_be_bytes();
                line.push_back(hi);
                if lo != 0 || i + 1 < values.len() {
                    line.push_back(lo);
                }
            }
        }
    }

    #[async_trait]
    impl ModbusTransport for LoopbackDevice {
        async fn connect(&mut self) -> ModbusResult<()> {
            self.state = TransportState::Connected;
            Ok(())
        }

        async fn disconnect(&mut self) -> ModbusResult<()> {
            self.state = TransportState::Disconnected;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.state.is_connected()
        }

        fn state(&self) -> TransportState {
            self.state
        }

        async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
            let mut line = self.line.lock().unwrap();
            if address == self.map.status.address() {
                let status = StatusWord::default()
                    .with_receive_available(line.len().min(127) as u8)
                    .with_transmit_available(127)
                    .with_connected(true);
                return Ok(vec![status.bits()]);
            }
            let take = (count as usize * 2).min(line.len());
            let chars: Vec<u8> = line.drain(..take).collect();
            let mut registers = pack_chars(&chars);
            registers.resize(count as usize, 0);
            Ok(registers)
        }

        async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
            self.absorb(address, &[value]);
            Ok(())
        }

        async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
            self.absorb(address, values);
            Ok(())
        }

        fn unit_id(&self) -> u8 {
            1
        }

        fn display_name(&self) -> String {
            "loopback".to_string()
        }
    }

    fn tunnel(device: LoopbackDevice) -> SerialTunnel<LoopbackDevice> {
        let config = TunnelConfig::new(Layout::RxTx)
            .with_poll_interval(Duration::from_millis(1))
            .with_retry(RetryConfig::no_retry());
        SerialTunnel::new(device, config).unwrap()
    }

    #[tokio::test]
    async fn test_bridge_echoes_through_loopback() {
        let tunnel = tunnel(LoopbackDevice::new());
        let coordinator = ShutdownCoordinator::new();
        let (output, mut reader) = tokio::io::duplex(1024);
        let message = b"hello through the tunnel";

        let options = BridgeOptions::default();
        let bridge = run_bridge(
            &tunnel,
            &options,
            &message[..],
            output,
            coordinator.shutdown_signal(),
        );

        let check = async {
            let mut echoed = vec![0u8; message.len()];
            reader.read_exact(&mut echoed).await.unwrap();
            coordinator.initiate_shutdown();
            echoed
        };

        let both = async move { tokio::join!(bridge, check) };
        let (result, echoed) = tokio::time::timeout(Duration::from_secs(5), both)
            .await
            .expect("bridge should finish");

        result.unwrap();
        assert_eq!(echoed, message);
        assert_eq!(tunnel.stats().snapshot().chars_sent, message.len() as u64);
    }

    #[tokio::test]
    async fn test_bridge_exits_on_eof() {
        let device = LoopbackDevice::new();
        let tunnel = tunnel(device.clone());
        let coordinator = ShutdownCoordinator::new();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_bridge(
                &tunnel,
                &BridgeOptions {
                    baud_rate: None,
                    exit_on_eof: true,
                },
                &b"abc"[..],
                tokio::io::sink(),
                coordinator.shutdown_signal(),
            ),
        )
        .await
        .expect("bridge should stop after input drains")
        .unwrap();

        assert_eq!(tunnel.stats().snapshot().chars_sent, 3);
    }

    #[test]
    fn test_runtime_builder() {
        let config = AppConfig::new(ModbusTcpConfig::new("127.0.0.1"));
        let runtime = RuntimeBuilder::new()
            .config(config.clone())
            .baud_rate(Some(57_600))
            .build()
            .unwrap();

        assert_eq!(runtime.config(), &config);
        assert_eq!(runtime.options.baud_rate, Some(57_600));
        assert!(!runtime.shutdown_coordinator().is_shutdown_initiated());
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        assert!(RuntimeBuilder::new().build().is_err());
    }
}
