// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Stopping the bridge.
//!
//! A single `watch` flag is flipped either by an OS signal (SIGTERM,
//! SIGINT or SIGQUIT on Unix, Ctrl+C elsewhere) or by a direct call to
//! [`ShutdownCoordinator::initiate_shutdown`]. Every [`ShutdownSignal`]
//! observes the flip, including ones created afterwards.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Owner of the stop flag. Clones share it.
///
/// ```ignore
/// let coordinator = ShutdownCoordinator::new();
/// let signal = coordinator.shutdown_signal();
/// tokio::spawn({
///     let coordinator = coordinator.clone();
///     async move { coordinator.listen_for_signals().await }
/// });
/// signal.wait().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownCoordinator {
    /// Coordinator with the flag down.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(watch::Sender::new(false)),
        }
    }

    /// A handle that resolves once the flag is up.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            flag: self.flag.subscribe(),
        }
    }

    /// Raises the flag. Later calls do nothing.
    pub fn initiate_shutdown(&self) {
        let raised = self.flag.send_if_modified(|stopping| !std::mem::replace(stopping, true));
        if raised {
            info!("Shutting down");
        }
    }

    /// Whether the flag is up.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.flag.borrow()
    }

    /// Raises the flag when the process is asked to stop.
    pub async fn listen_for_signals(&self) {
        if !self.is_shutdown_initiated() {
            os_stop_request().await;
            self.initiate_shutdown();
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_stop_request() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut term, mut int, mut quit) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::quit()),
    ) {
        (Ok(term), Ok(int), Ok(quit)) => (term, int, quit),
        _ => {
            warn!("Unix signal handlers unavailable, listening for Ctrl+C only");
            return ctrl_c().await;
        }
    };

    let name = tokio::select! {
        _ = term.recv() => "SIGTERM",
        _ = int.recv() => "SIGINT",
        _ = quit.recv() => "SIGQUIT",
    };
    info!(signal = name, "Stop requested");
}

#[cfg(not(unix))]
async fn os_stop_request() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable; the bridge stops only on EOF or error");
        std::future::pending::<()>().await;
    }
    info!(signal = "Ctrl+C", "Stop requested");
}

/// Resolves once the coordinator's flag is up.
pub struct ShutdownSignal {
    flag: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the flag. Cancel safe, so it can sit in a `select!` loop.
    ///
    /// If every coordinator is dropped without raising the flag this never
    /// resolves.
    pub async fn recv(&mut self) {
        if self.flag.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Consumes the handle and waits for the flag.
    pub async fn wait(mut self) {
        self.recv().await;
    }

    /// Whether the flag is up.
    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_resolves_after_initiate() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.shutdown_signal();
        assert!(!signal.is_triggered());

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("signal should resolve");
        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        let mut signal = coordinator.shutdown_signal();
        assert!(signal.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), signal.recv())
            .await
            .expect("flag already up");
    }

    #[tokio::test]
    async fn test_recv_is_reusable_in_select() {
        let coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.shutdown_signal();

        for _ in 0..3 {
            tokio::select! {
                _ = signal.recv() => panic!("flag is down"),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
        coordinator.initiate_shutdown();
        tokio::time::timeout(Duration::from_millis(100), signal.recv())
            .await
            .expect("flag raised");
    }

    #[tokio::test]
    async fn test_listener_returns_when_already_stopping() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        tokio::time::timeout(Duration::from_millis(100), coordinator.listen_for_signals())
            .await
            .expect("listener should return at once");
    }

    #[tokio::test]
    async fn test_dropped_coordinator_never_fires() {
        let mut signal = ShutdownCoordinator::new().shutdown_signal();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.recv()).await;
        assert!(waited.is_err());
    }
}
