// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register access for the tunnel.
//!
//! [`RegisterClient`] sits between the tunnel and a [`ModbusTransport`]. It
//! speaks in 1-origin [`RegisterId`]s, checks request sizes against what a
//! single PDU can carry, repeats transient failures and keeps counters.

mod handle;
pub mod retry;
mod rtu;
mod tcp;
mod transport;

pub use handle::TransportHandle;
pub use retry::{RetryConfig, RetryStrategy};
pub use rtu::ModbusRtuTransport;
pub use tcp::ModbusTcpTransport;
pub use transport::{
    FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_REGISTER,
    ModbusTransport, TransportState,
};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use mbserial_protocol::RegisterId;
use tokio::sync::Mutex;

use crate::error::{ModbusError, ModbusResult, OperationError, ProtocolError};

/// Register limit of one FC03 request.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Register limit of one FC16 request.
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Holding-register client addressed by [`RegisterId`].
///
/// The transport sits behind a mutex so one client can be shared by the
/// tunnel and anything else that needs the bus.
pub struct RegisterClient<T: ModbusTransport> {
    transport: Mutex<T>,
    retry: RetryConfig,
    stats: ClientStats,
}

impl<T: ModbusTransport> RegisterClient<T> {
    /// Client with the default retry policy.
    pub fn new(transport: T) -> Self {
        Self::with_retry(transport, RetryConfig::default())
    }

    /// Client with `retry` as its retry policy.
    pub fn with_retry(transport: T, retry: RetryConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            retry,
            stats: ClientStats::default(),
        }
    }

    /// Request counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Opens the transport.
    pub async fn connect(&self) -> ModbusResult<()> {
        self.transport.lock().await.connect().await?;
        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Closes the transport.
    pub async fn disconnect(&self) -> ModbusResult<()> {
        self.transport.lock().await.disconnect().await
    }

    /// Closes and reopens the transport. A failing close is ignored.
    pub async fn reconnect(&self) -> ModbusResult<()> {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.disconnect().await {
            tracing::debug!(error = %e, "Close before reconnect failed");
        }
        transport.connect().await?;
        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        tracing::info!(transport = %transport.display_name(), "Reconnected");
        Ok(())
    }

    /// Whether the transport is open.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Transport state.
    pub async fn state(&self) -> TransportState {
        self.transport.lock().await.state()
    }

    /// Transport endpoint.
    pub async fn display_name(&self) -> String {
        self.transport.lock().await.display_name()
    }

    /// Reads `count` registers starting at `id`.
    pub async fn read_registers(&self, id: RegisterId, count: u16) -> ModbusResult<Vec<u16>> {
        check_count(count.into(), MAX_READ_REGISTERS)?;
        let address = id.address();

        let values = self
            .attempt(|| async move {
                self.transport.lock().await.read_holding_registers(address, count).await
            })
            .await?;

        if values.len() != usize::from(count) {
            return Err(ModbusError::protocol(ProtocolError::unexpected(format!(
                "{count} registers requested at {id}, {} returned",
                values.len()
            ))));
        }
        tracing::trace!(register = %id, count, "Read");
        Ok(values)
    }

    /// Reads the register `id`.
    pub async fn read_register(&self, id: RegisterId) -> ModbusResult<u16> {
        let values = self.read_registers(id, 1).await?;
        Ok(values[0])
    }

    /// Writes `value` to `id` with FC06.
    pub async fn write_register(&self, id: RegisterId, value: u16) -> ModbusResult<()> {
        let address = id.address();
        self.attempt(|| async move {
            self.transport.lock().await.write_single_register(address, value).await
        })
        .await?;
        tracing::trace!(register = %id, value, "Wrote");
        Ok(())
    }

    /// Writes `values` starting at `id` with FC16.
    pub async fn write_registers(&self, id: RegisterId, values: &[u16]) -> ModbusResult<()> {
        check_count(values.len(), MAX_WRITE_REGISTERS)?;
        let address = id.address();
        self.attempt(|| async move {
            self.transport.lock().await.write_multiple_registers(address, values).await
        })
        .await?;
        tracing::trace!(register = %id, count = values.len(), "Wrote");
        Ok(())
    }

    /// Runs `request`, repeating it while the retry policy allows.
    async fn attempt<F, Fut, R>(&self, request: F) -> ModbusResult<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ModbusResult<R>>,
    {
        let started = Instant::now();
        let mut retries = 0;

        loop {
            let error = match request().await {
                Ok(value) => {
                    self.stats.record_success(started.elapsed());
                    return Ok(value);
                }
                Err(error) => error,
            };

            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            if !self.retry.should_retry(&error, retries) {
                return Err(error);
            }

            let pause = self.retry.strategy.delay(retries);
            retries += 1;
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                retry = retries,
                of = self.retry.max_retries,
                pause_ms = pause.as_millis() as u64,
                error = %error,
                "Repeating register request"
            );
            tokio::time::sleep(pause).await;
        }
    }
}

fn check_count(count: usize, max: u16) -> ModbusResult<()> {
    if count == 0 || count > usize::from(max) {
        return Err(ModbusError::operation(OperationError::invalid_count(count, 1, max)));
    }
    Ok(())
}

/// Request counters of a [`RegisterClient`].
///
/// A request that succeeds after retries counts once as successful and
/// once per failed attempt as failed.
#[derive(Debug, Default)]
pub struct ClientStats {
    successful: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    busy_micros: AtomicU64,
    connections: AtomicU64,
}

impl ClientStats {
    fn record_success(&self, elapsed: Duration) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.busy_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Requests that eventually succeeded.
    pub fn successful_requests(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    /// Attempts that failed.
    pub fn failed_requests(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Repeats issued.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Successful `connect` and `reconnect` calls.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Mean time from first attempt to success.
    pub fn average_latency(&self) -> Duration {
        match self.successful_requests() {
            0 => Duration::ZERO,
            n => Duration::from_micros(self.busy_micros.load(Ordering::Relaxed) / n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_stats() {
        let stats = ClientStats::default();
        stats.record_success(Duration::from_millis(10));
        stats.record_success(Duration::from_millis(20));
        stats.failed.fetch_add(1, Ordering::Relaxed);

        assert_eq!(stats.successful_requests(), 2);
        assert_eq!(stats.failed_requests(), 1);
        assert_eq!(stats.average_latency(), Duration::from_millis(15));
        assert_eq!(ClientStats::default().average_latency(), Duration::ZERO);
    }

    #[test]
    fn test_request_size_limits() {
        assert!(check_count(1, MAX_READ_REGISTERS).is_ok());
        assert!(check_count(125, MAX_READ_REGISTERS).is_ok());
        assert!(check_count(0, MAX_READ_REGISTERS).is_err());
        assert!(check_count(126, MAX_READ_REGISTERS).is_err());
        assert!(check_count(124, MAX_WRITE_REGISTERS).is_err());
    }

    #[tokio::test]
    async fn test_unconnected_client_fails_without_retry_storm() {
        let client = RegisterClient::with_retry(
            ModbusTcpTransport::simple("127.0.0.1", 502),
            RetryConfig::no_retry(),
        );
        let err = client.read_register(RegisterId::new(1001)).await.unwrap_err();
        assert_eq!(err.category(), "connection");
        assert_eq!(client.stats().failed_requests(), 1);
        assert_eq!(client.stats().retries(), 0);
    }

    #[tokio::test]
    async fn test_oversized_write_rejected_before_io() {
        let client = RegisterClient::new(ModbusTcpTransport::simple("127.0.0.1", 502));
        let values = vec![0u16; 124];
        let err = client.write_registers(RegisterId::new(2001), &values).await.unwrap_err();
        assert_eq!(err.category(), "operation");
        assert_eq!(client.stats().failed_requests(), 0);
    }
}
