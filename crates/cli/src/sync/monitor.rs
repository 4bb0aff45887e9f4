// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitoring.
//!
//! Turns a raw reachability signal and backend probes into a debounced
//! three-state [`ConnectionStatus`]:
//!
//! - Reachability gain is reported at once as `reconnecting`; the first
//!   successful probe promotes it to `connected`.
//! - A loss (raw signal down, or a failed heartbeat) must outlast the grace
//!   window before `disconnected` is reported.
//! - Probes are bounded by a timeout; a timed-out probe leaves the status in
//!   `reconnecting` and is retried after the probe interval.
//!
//! The monitor never touches the operation queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tt_core::ConnectionStatus;

use super::backend::{with_timeout, Backend, BackendResult};
use super::publish::{StatePublisher, Subscription};

/// Configuration for the connectivity monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How long a loss must persist before `disconnected` is reported.
    pub grace: Duration,
    /// Maximum wait for a probe round trip.
    pub probe_timeout: Duration,
    /// Delay between probes while reconnecting.
    pub probe_interval: Duration,
    /// Heartbeat period while connected (`None` = disabled).
    pub heartbeat_interval: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            grace: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(5),
            probe_interval: Duration::from_secs(2),
            heartbeat_interval: Some(Duration::from_secs(15)),
        }
    }
}

/// Observes backend reachability and publishes connection status readings.
///
/// The probing task runs in the background until [`stop`](Self::stop) is
/// called or the monitor is dropped.
pub struct ConnectivityMonitor {
    status: StatePublisher<ConnectionStatus>,
    cancel_token: CancellationToken,
}

impl ConnectivityMonitor {
    /// Spawn the monitor task.
    ///
    /// `reachability` is the low-level signal (network interface up, socket
    /// open). If its sender goes away the last value is kept and only
    /// heartbeats detect further changes.
    pub fn spawn<B: Backend>(
        config: MonitorConfig,
        backend: Arc<B>,
        reachability: watch::Receiver<bool>,
    ) -> Self {
        let status = StatePublisher::new(ConnectionStatus::Disconnected);
        let cancel_token = CancellationToken::new();

        let task = MonitorTask {
            config,
            backend,
            reachability,
            signal_open: true,
            status: status.clone(),
            cancel: cancel_token.clone(),
        };
        tokio::spawn(task.run());

        ConnectivityMonitor {
            status,
            cancel_token,
        }
    }

    /// Subscribe to readings: the current one immediately, then each change.
    pub fn observe(&self) -> Subscription<ConnectionStatus> {
        self.status.subscribe()
    }

    /// The latest reading.
    pub fn current(&self) -> ConnectionStatus {
        self.status.get()
    }

    /// Stop probing. The final reading is `disconnected`.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Cancelled,
    Signal,
    Timer,
}

struct MonitorTask<B> {
    config: MonitorConfig,
    backend: Arc<B>,
    reachability: watch::Receiver<bool>,
    /// False once the reachability sender has been dropped.
    signal_open: bool,
    status: StatePublisher<ConnectionStatus>,
    cancel: CancellationToken,
}

impl<B: Backend> MonitorTask<B> {
    async fn run(mut self) {
        // Set while a loss is being debounced.
        let mut loss_deadline: Option<Instant> = None;
        // False after a heartbeat failure, until a probe succeeds again.
        let mut link_ok = true;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let raw = *self.reachability.borrow_and_update();
            let status = self.status.get();

            if status != ConnectionStatus::Disconnected && !(raw && link_ok) {
                let now = Instant::now();
                let deadline = *loss_deadline.get_or_insert(now + self.config.grace);
                if now >= deadline {
                    tracing::info!("backend unreachable for longer than {:?}", self.config.grace);
                    self.set(ConnectionStatus::Disconnected);
                    loss_deadline = None;
                    link_ok = true;
                    continue;
                }

                // Keep probing a suspect link while the raw signal still claims reachability
                let recheck = raw && !link_ok;
                let wake_at = if recheck {
                    deadline.min(now + self.config.probe_interval)
                } else {
                    deadline
                };
                match self.wait(Some(wake_at)).await {
                    Wake::Cancelled => break,
                    Wake::Timer if recheck => match self.probe().await {
                        None => break,
                        Some(Ok(())) => {
                            tracing::debug!("link recovered within grace window");
                            link_ok = true;
                        }
                        Some(Err(e)) => tracing::debug!("recheck probe failed: {}", e),
                    },
                    Wake::Timer | Wake::Signal => {}
                }
                continue;
            }
            loss_deadline = None;

            match status {
                ConnectionStatus::Disconnected => {
                    if raw {
                        self.set(ConnectionStatus::Reconnecting);
                    } else if self.wait(None).await == Wake::Cancelled {
                        break;
                    }
                }
                ConnectionStatus::Reconnecting => match self.probe().await {
                    None => break,
                    Some(Ok(())) => self.set(ConnectionStatus::Connected),
                    Some(Err(e)) => {
                        tracing::debug!("probe failed, still reconnecting: {}", e);
                        let retry_at = Instant::now() + self.config.probe_interval;
                        if self.wait(Some(retry_at)).await == Wake::Cancelled {
                            break;
                        }
                    }
                },
                ConnectionStatus::Connected => {
                    let heartbeat_at = self.config.heartbeat_interval.map(|i| Instant::now() + i);
                    match self.wait(heartbeat_at).await {
                        Wake::Cancelled => break,
                        Wake::Signal => {}
                        Wake::Timer => match self.probe().await {
                            None => break,
                            Some(Ok(())) => {}
                            Some(Err(e)) => {
                                tracing::warn!("heartbeat failed: {}", e);
                                link_ok = false;
                            }
                        },
                    }
                }
            }
        }

        self.set(ConnectionStatus::Disconnected);
        tracing::debug!("connectivity monitor stopped");
    }

    fn set(&self, status: ConnectionStatus) {
        let previous = self.status.get();
        if self.status.publish(status) {
            tracing::info!("connectivity: {} -> {}", previous, status);
        }
    }

    /// One bounded round trip. Returns `None` if cancelled.
    async fn probe(&self) -> Option<BackendResult<()>> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = with_timeout(self.config.probe_timeout, self.backend.ping()) => Some(result),
        }
    }

    /// Sleep until `deadline`, a reachability change, or cancellation.
    async fn wait(&mut self, deadline: Option<Instant>) -> Wake {
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let signal_open = self.signal_open;
        let wake = tokio::select! {
            _ = self.cancel.cancelled() => Ok(Wake::Cancelled),
            changed = self.reachability.changed(), if signal_open => changed.map(|_| Wake::Signal),
            _ = timer => Ok(Wake::Timer),
        };

        wake.unwrap_or_else(|_| {
            tracing::debug!("reachability signal closed; relying on heartbeats");
            self.signal_open = false;
            Wake::Signal
        })
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
