// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Serial tunnel engine.
//!
//! [`SerialTunnel`] moves a byte stream through the device's register
//! windows. Every cycle starts with a fresh status read; the status word is
//! never carried from one cycle to the next.
//!
//! ```text
//!   transmit(data)                         receive()
//!        │                                     │
//!        ▼                                     ▼
//!   read STATUS ──▶ connected? ──no──▶ 0   read STATUS
//!        │ yes                                 │
//!        ▼                                     ▼
//!   plan_transmit(min(avail, len))        plan_receive(rx avail)
//!        │                                     │
//!        ▼                                     ▼
//!   pack_chars ──▶ FC06 / FC16            FC03 ──▶ unpack_chars
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use mbserial_protocol::{
    Layout, RegisterMap, RegisterWindow, StatusWord, pack_chars, unpack_chars,
};
use serde::Serialize;

use crate::client::{ModbusTransport, RegisterClient};
use crate::error::{ModbusError, ModbusResult, TunnelError};
use crate::types::TunnelConfig;

/// Byte-stream tunnel over a register-mapped device.
pub struct SerialTunnel<T: ModbusTransport> {
    client: RegisterClient<T>,
    map: RegisterMap,
    config: TunnelConfig,
    transmit_limit: usize,
    stats: TunnelStats,
}

impl<T: ModbusTransport> SerialTunnel<T> {
    /// Creates a tunnel over `transport`. Does not connect.
    pub fn new(transport: T, config: TunnelConfig) -> ModbusResult<Self> {
        config.validate()?;
        let client = RegisterClient::with_retry(transport, config.retry.clone());
        Ok(Self::from_client(client, config))
    }

    /// Creates a tunnel over an existing client.
    ///
    /// The client keeps its own retry policy.
    pub fn from_client(client: RegisterClient<T>, config: TunnelConfig) -> Self {
        let map = config.layout.register_map();
        Self {
            client,
            map,
            transmit_limit: transmit_char_limit(map.transmit),
            config,
            stats: TunnelStats::default(),
        }
    }

    /// The register client.
    pub fn client(&self) -> &RegisterClient<T> {
        &self.client
    }

    /// The register map in use.
    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// The layout in use.
    pub fn layout(&self) -> Layout {
        self.map.layout
    }

    /// The tunnel configuration.
    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Tunnel counters.
    pub fn stats(&self) -> &TunnelStats {
        &self.stats
    }

    /// Most characters a single transmit cycle will send.
    ///
    /// Keeps every transmit plan inside the transmit window.
    pub fn transmit_limit(&self) -> usize {
        self.transmit_limit
    }

    /// Connects the underlying transport.
    pub async fn connect(&self) -> ModbusResult<()> {
        self.client.connect().await?;
        tracing::info!(
            transport = %self.client.display_name().await,
            layout = %self.map.layout,
            "Serial tunnel connected"
        );
        Ok(())
    }

    /// Disconnects the underlying transport.
    pub async fn disconnect(&self) -> ModbusResult<()> {
        self.client.disconnect().await
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Reads the status register.
    pub async fn status(&self) -> ModbusResult<StatusWord> {
        let status = StatusWord::from_bits(self.client.read_register(self.map.status).await?);
        tracing::trace!(status = %status, bits = status.bits(), "Read status");
        Ok(status)
    }

    /// Collects the characters the device is holding for the host.
    ///
    /// Returns an empty vector if nothing is waiting. Data already buffered
    /// by the device is collected even while the serial link is down.
    pub async fn receive(&self) -> ModbusResult<Vec<u8>> {
        let status = self.status().await?;
        self.receive_with(status).await
    }

    /// Sends as much of `data` as the device will take in one cycle.
    ///
    /// Returns the number of characters written. Nothing is written, and
    /// `0` is returned, while the serial link is down or the device has no
    /// room.
    pub async fn transmit(&self, data: &[u8]) -> ModbusResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let status = self.status().await?;
        self.transmit_with(status, data).await
    }

    /// Sends all of `data`, cycling until it is drained.
    ///
    /// Fails with [`TunnelError::LinkDown`] if the link drops and with
    /// [`TunnelError::TransmitStalled`] once `max_transmit_cycles` cycles
    /// have gone by.
    pub async fn transmit_all(&self, data: &[u8]) -> ModbusResult<()> {
        let total = data.len();
        let mut sent = 0;

        for _ in 0..self.config.max_transmit_cycles {
            if sent == total {
                return Ok(());
            }

            let status = self.status().await?;
            if !status.is_connected() {
                self.stats.link_down.fetch_add(1, Ordering::Relaxed);
                return Err(ModbusError::tunnel(TunnelError::LinkDown { sent, total }));
            }

            let n = self.transmit_with(status, &data[sent..]).await?;
            sent += n;
            if n == 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        if sent == total {
            return Ok(());
        }

        tracing::warn!(
            sent,
            total,
            cycles = self.config.max_transmit_cycles,
            "Transmit stalled"
        );
        Err(ModbusError::tunnel(TunnelError::TransmitStalled {
            cycles: self.config.max_transmit_cycles,
            sent,
            total,
        }))
    }

    /// Runs one full cycle: one status read, then receive and transmit.
    pub async fn poll(&self, outgoing: &[u8]) -> ModbusResult<PollOutcome> {
        let status = self.status().await?;
        let received = self.receive_with(status).await?;
        let sent = if outgoing.is_empty() {
            0
        } else {
            self.transmit_with(status, outgoing).await?
        };

        Ok(PollOutcome {
            status,
            received,
            sent,
        })
    }

    async fn receive_with(&self, status: StatusWord) -> ModbusResult<Vec<u8>> {
        let mut plan = self.map.plan_receive(status);
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let capacity = self.map.receive.size();
        if plan.register_count > capacity {
            tracing::debug!(
                reported = plan.chars_available,
                window = capacity,
                "Receive count exceeds window, reading window only"
            );
            plan.register_count = capacity;
        }

        let chars = (plan.chars_available as usize).min(plan.register_count as usize * 2);
        let registers = self
            .client
            .read_registers(plan.base_register, plan.register_count)
            .await?;
        let data = unpack_chars(&registers, chars)?;

        self.stats.receive_cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .chars_received
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            base = %plan.base_register,
            registers = plan.register_count,
            chars = data.len(),
            "Received"
        );
        Ok(data)
    }

    async fn transmit_with(&self, status: StatusWord, data: &[u8]) -> ModbusResult<usize> {
        if !status.is_connected() {
            self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(pending = data.len(), "Serial link down, transmit suppressed");
            return Ok(0);
        }

        let requested = data.len().min(self.transmit_limit);
        let plan = self.map.plan_transmit(status, requested);
        if plan.is_empty() {
            self.stats.stalled.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pending = data.len(), "No transmit room");
            return Ok(0);
        }

        let chars = plan.chars_to_send as usize;
        let registers = pack_chars(&data[..chars]);
        if let [value] = registers.as_slice() {
            self.client.write_register(plan.base_register, *value).await?;
        } else {
            self.client
                .write_registers(plan.base_register, &registers)
                .await?;
        }

        self.stats.transmit_cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .chars_sent
            .fetch_add(chars as u64, Ordering::Relaxed);
        tracing::debug!(
            base = %plan.base_register,
            registers = plan.register_count,
            chars,
            "Transmitted"
        );
        Ok(chars)
    }

    // =========================================================================
    // Device Registers
    // =========================================================================

    /// Sends a single character through the transmit-byte register.
    ///
    /// Returns `false` without writing if the link is down or the device
    /// has no room.
    pub async fn transmit_byte(&self, byte: u8) -> ModbusResult<bool> {
        let register = self
            .map
            .transmit_byte
            .ok_or_else(|| TunnelError::unsupported(self.map.layout, "a transmit-byte register"))?;

        let status = self.status().await?;
        if !status.is_connected() || status.transmit_available() == 0 {
            return Ok(false);
        }

        self.client.write_register(register, u16::from(byte)).await?;
        self.stats.chars_sent.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Sets the device's serial data rate.
    ///
    /// The 32-bit value spans two registers, high word first.
    pub async fn set_baud_rate(&self, baud_rate: u32) -> ModbusResult<()> {
        let register = self
            .map
            .baud_rate
            .ok_or_else(|| TunnelError::unsupported(self.map.layout, "baud rate"))?;

        self.client
            .write_registers(register, &split_u32(baud_rate))
            .await?;
        tracing::info!(baud_rate, "Set serial data rate");
        Ok(())
    }

    /// Reads the device's serial data rate.
    pub async fn baud_rate(&self) -> ModbusResult<u32> {
        let register = self
            .map
            .baud_rate
            .ok_or_else(|| TunnelError::unsupported(self.map.layout, "baud rate"))?;

        let words = self.client.read_registers(register, 2).await?;
        Ok(join_u32(words[0], words[1]))
    }
}

/// Characters per transmit cycle that keep the plan inside `window`.
///
/// An even register count ends one below the window's last register, so
/// an even-sized window can only be filled up to `size - 1` registers.
fn transmit_char_limit(window: RegisterWindow) -> usize {
    let size = window.size() as usize;
    let registers = if size % 2 == 1 { size } else { size - 1 };
    registers * 2
}

fn split_u32(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, value as u16]
}

fn join_u32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Result of one [`SerialTunnel::poll`] cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Status word read at the start of the cycle.
    pub status: StatusWord,
    /// Characters collected from the device.
    pub received: Vec<u8>,
    /// Characters of the outgoing buffer accepted by the device.
    pub sent: usize,
}

impl PollOutcome {
    /// Returns `true` if nothing moved in either direction.
    pub fn is_idle(&self) -> bool {
        self.received.is_empty() && self.sent == 0
    }
}

/// Tunnel counters.
#[derive(Debug, Default)]
pub struct TunnelStats {
    chars_sent: AtomicU64,
    chars_received: AtomicU64,
    transmit_cycles: AtomicU64,
    receive_cycles: AtomicU64,
    suppressed: AtomicU64,
    stalled: AtomicU64,
    link_down: AtomicU64,
}

impl TunnelStats {
    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> TunnelStatsSnapshot {
        TunnelStatsSnapshot {
            chars_sent: self.chars_sent.load(Ordering::Relaxed),
            chars_received: self.chars_received.load(Ordering::Relaxed),
            transmit_cycles: self.transmit_cycles.load(Ordering::Relaxed),
            receive_cycles: self.receive_cycles.load(Ordering::Relaxed),
            suppressed_transmits: self.suppressed.load(Ordering::Relaxed),
            stalled_transmits: self.stalled.load(Ordering::Relaxed),
            link_down_events: self.link_down.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`TunnelStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TunnelStatsSnapshot {
    /// Characters accepted by the device.
    pub chars_sent: u64,
    /// Characters collected from the device.
    pub chars_received: u64,
    /// Cycles that wrote data.
    pub transmit_cycles: u64,
    /// Cycles that read data.
    pub receive_cycles: u64,
    /// Transmits skipped because the link was down.
    pub suppressed_transmits: u64,
    /// Transmits skipped because the device had no room.
    pub stalled_transmits: u64,
    /// `transmit_all` calls aborted by a dropped link.
    pub link_down_events: u64,
}
