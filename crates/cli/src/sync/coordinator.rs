// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync coordinator: the state machine tying connectivity to queue draining.
//!
//! # States
//!
//! ```text
//!   disconnected ──gain──► reconnecting ──round trip──► connected ◄─┐
//!        ▲                                               │ queue    │ queue
//!        └─────────────loss (any time, mid-drain)────────┤ non-empty│ empty
//!                                                        ▼          │
//!                                                 connected+syncing─┘
//! ```
//!
//! The coordinator is the only writer of the operation queue and of the
//! published status, pending count and [`SyncState`]. Readers subscribe and
//! receive every change in order.
//!
//! # Draining
//!
//! A drain repeatedly peeks a FIFO batch, groups it by target path, and
//! dispatches each path's operations in order while distinct paths run
//! concurrently up to `max_in_flight`. A failed write is marked failed and
//! its path is skipped until the next drain. A connectivity failure, or a
//! disconnect observed mid-drain, ends the drain with the remaining writes
//! still queued. Only one drain runs at a time; requests made while one is
//! running are coalesced into it. A reconnect or manual retry coalesced into
//! a drain that then stops short of the queue runs one more pass.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tt_core::{ConnectionStatus, OpId, OperationDraft, PendingOperation, SyncState};

use super::backend::{with_timeout, Backend, BackendError};
use super::publish::{lock, EventPublisher, StatePublisher, Subscription};
use super::queue::{MarkFailed, OperationQueue, QueueResult};

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum writes in flight across distinct paths.
    pub max_in_flight: usize,
    /// Operations peeked from the queue per drain step.
    pub batch_size: usize,
    /// Maximum wait for one write round trip.
    pub dispatch_timeout: Duration,
    /// Queued operations older than this are reported at drain start.
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_in_flight: 4,
            batch_size: 32,
            dispatch_timeout: Duration::from_secs(10),
            stale_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A write that exhausted its attempt budget and left the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalFailure {
    pub operation: PendingOperation,
    /// Backend error from the last attempt.
    pub reason: String,
}

impl std::fmt::Display for TerminalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} failed after {} attempt(s): {}",
            self.operation.id,
            self.operation.kind,
            self.operation.target_path,
            self.operation.attempt_count,
            self.reason
        )
    }
}

/// Final result of one enqueued write.
pub type WriteOutcome = Result<(), TerminalFailure>;

/// Receipt for an enqueued write.
pub struct Ticket {
    id: OpId,
    rx: oneshot::Receiver<WriteOutcome>,
}

impl Ticket {
    /// The id assigned by the queue.
    pub fn id(&self) -> &OpId {
        &self.id
    }

    /// Wait until the write is confirmed or fails terminally.
    ///
    /// Returns `None` if the coordinator shut down first; the write itself
    /// stays queued.
    pub async fn outcome(self) -> Option<WriteOutcome> {
        self.rx.await.ok()
    }
}

/// Summary of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Writes confirmed and removed.
    pub confirmed: usize,
    /// Writes that failed and will be retried.
    pub failed: usize,
    /// Writes that failed terminally.
    pub terminal: usize,
    /// Queue length when the drain ended.
    pub remaining: usize,
    /// True if the drain stopped because the link went away.
    pub interrupted: bool,
}

type FailureCallback = Box<dyn Fn(&TerminalFailure) + Send + Sync>;

/// Builder for [`SyncCoordinator`], for wiring optional callbacks before start.
pub struct SyncCoordinatorBuilder<B> {
    config: SyncConfig,
    backend: Arc<B>,
    queue: OperationQueue,
    on_terminal_failure: Option<FailureCallback>,
}

impl<B: Backend> SyncCoordinatorBuilder<B> {
    /// Register a callback invoked once per terminal failure.
    pub fn on_terminal_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TerminalFailure) + Send + Sync + 'static,
    {
        self.on_terminal_failure = Some(Box::new(callback));
        self
    }

    /// Start following connectivity readings.
    pub fn start(self, readings: Subscription<ConnectionStatus>) -> SyncCoordinator<B> {
        let pending = self.queue.len();
        let initial = SyncState::new(ConnectionStatus::Disconnected, pending, 0);

        let shared = Arc::new(Shared {
            config: self.config,
            backend: self.backend,
            queue: Mutex::new(self.queue),
            status: StatePublisher::new(ConnectionStatus::Disconnected),
            pending: StatePublisher::new(pending),
            state: StatePublisher::new(initial),
            failures: EventPublisher::new(),
            failed_count: AtomicUsize::new(0),
            publish_lock: Mutex::new(()),
            waiters: Mutex::new(HashMap::new()),
            draining: AtomicBool::new(false),
            reconnect_requested: AtomicBool::new(false),
            retry_requested: AtomicBool::new(false),
            disconnect_epoch: AtomicU64::new(0),
            on_terminal_failure: self.on_terminal_failure,
            cancel: CancellationToken::new(),
        });

        tracing::info!("sync coordinator started with {} queued operation(s)", pending);
        tokio::spawn(Arc::clone(&shared).run(readings));

        SyncCoordinator { shared }
    }
}

/// Owns the connection state machine and the operation queue.
pub struct SyncCoordinator<B: Backend> {
    shared: Arc<Shared<B>>,
}

impl<B: Backend> SyncCoordinator<B> {
    pub fn builder(
        config: SyncConfig,
        backend: Arc<B>,
        queue: OperationQueue,
    ) -> SyncCoordinatorBuilder<B> {
        SyncCoordinatorBuilder {
            config,
            backend,
            queue,
            on_terminal_failure: None,
        }
    }

    /// Create and start a coordinator with no failure callback.
    pub fn start(
        config: SyncConfig,
        backend: Arc<B>,
        queue: OperationQueue,
        readings: Subscription<ConnectionStatus>,
    ) -> Self {
        Self::builder(config, backend, queue).start(readings)
    }

    /// Stage a write. It is persisted before this returns.
    ///
    /// When connected and no drain is running, a drain starts in the
    /// background.
    pub fn enqueue(&self, draft: OperationDraft) -> QueueResult<Ticket> {
        let shared = &self.shared;
        let (tx, rx) = oneshot::channel();

        let (id, start) = {
            let mut queue = lock(&shared.queue);
            let id = queue.enqueue(draft)?;
            lock(&shared.waiters).insert(id.clone(), tx);
            let start = shared.status.get().is_connected() && shared.try_acquire_drain();
            (id, start)
        };
        tracing::debug!("enqueued {}", id);

        shared.publish_state(None);
        if start {
            shared.spawn_drain();
        }
        Ok(Ticket { id, rx })
    }

    /// Run a drain now, whatever the current status.
    ///
    /// Returns `None` if a drain is already running; that drain covers the
    /// request.
    pub async fn retry(&self) -> Option<DrainReport> {
        if !self.shared.request_drain(&self.shared.retry_requested) {
            tracing::debug!("retry coalesced into running drain");
            return None;
        }
        tracing::info!("manual retry requested");
        Some(self.shared.drain().await)
    }

    /// Connection status: the current value, then every transition.
    pub fn connection_status_stream(&self) -> Subscription<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Pending operation count: the current value, then every change.
    pub fn pending_operations_count(&self) -> Subscription<usize> {
        self.shared.pending.subscribe()
    }

    /// Status, phase, pending and failed counts as one consistent value.
    pub fn state_stream(&self) -> Subscription<SyncState> {
        self.shared.state.subscribe()
    }

    /// Terminal failures from now on.
    pub fn terminal_failures(&self) -> Subscription<TerminalFailure> {
        self.shared.failures.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.get()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.get()
    }

    pub fn state(&self) -> SyncState {
        self.shared.state.get()
    }

    /// Copy of the queued operations in dispatch order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        lock(&self.shared.queue).peek_all().to_vec()
    }

    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::Acquire)
    }

    /// Reset the reported terminal failure count.
    pub fn clear_failures(&self) {
        self.shared.failed_count.store(0, Ordering::SeqCst);
        self.shared.publish_state(None);
    }

    /// Stop following connectivity. The queue is left as is.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
    }
}

impl<B: Backend> Drop for SyncCoordinator<B> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

struct Shared<B> {
    config: SyncConfig,
    backend: Arc<B>,
    queue: Mutex<OperationQueue>,
    status: StatePublisher<ConnectionStatus>,
    pending: StatePublisher<usize>,
    state: StatePublisher<SyncState>,
    failures: EventPublisher<TerminalFailure>,
    failed_count: AtomicUsize,
    /// Serializes publication so status, count and state move together.
    publish_lock: Mutex<()>,
    waiters: Mutex<HashMap<OpId, oneshot::Sender<WriteOutcome>>>,
    draining: AtomicBool,
    /// Drain requests that found a drain already running.
    reconnect_requested: AtomicBool,
    retry_requested: AtomicBool,
    /// Bumped on every transition to `disconnected`.
    disconnect_epoch: AtomicU64,
    on_terminal_failure: Option<FailureCallback>,
    cancel: CancellationToken,
}

/// What happened to one path's operations during a drain step.
#[derive(Debug, Default)]
struct PathOutcome {
    confirmed: usize,
    failed: usize,
    terminal: usize,
    /// Set when a failure blocks the rest of this path for the drain.
    blocked: Option<String>,
    link_lost: bool,
}

/// How a failed dispatch was recorded in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recorded {
    Retry,
    Terminal,
    /// The queue could not be updated; the operation is unchanged.
    Unrecorded,
}

impl<B: Backend> Shared<B> {
    async fn run(self: Arc<Self>, mut readings: Subscription<ConnectionStatus>) {
        loop {
            let reading = tokio::select! {
                _ = self.cancel.cancelled() => break,
                reading = readings.next() => match reading {
                    Some(reading) => reading,
                    None => break,
                },
            };
            self.apply_reading(reading);
        }
        readings.cancel();
        tracing::debug!("sync coordinator stopped");
    }

    fn apply_reading(self: &Arc<Self>, reading: ConnectionStatus) {
        let current = self.status.get();
        for step in current.steps_to(reading) {
            if step == ConnectionStatus::Disconnected {
                self.disconnect_epoch.fetch_add(1, Ordering::SeqCst);
            }
            self.publish_state(Some(step));
        }

        if reading.is_connected() && !current.is_connected() {
            let pending = self.pending.get();
            if pending == 0 {
                return;
            }
            if self.request_drain(&self.reconnect_requested) {
                tracing::info!("connected with {} queued operation(s), syncing", pending);
                self.spawn_drain();
            } else {
                tracing::debug!("connected while a drain is unwinding");
            }
        }
    }

    /// Publish status (if given), pending count and combined state together.
    fn publish_state(&self, status: Option<ConnectionStatus>) {
        let _guard = lock(&self.publish_lock);
        if let Some(next) = status {
            let previous = self.status.get();
            if self.status.publish(next) {
                tracing::info!("sync status: {} -> {}", previous, next);
            }
        }
        let status = self.status.get();
        let pending = lock(&self.queue).len();
        let failed = self.failed_count.load(Ordering::SeqCst);

        self.pending.publish(pending);
        self.state.publish(SyncState::new(status, pending, failed));
    }

    fn try_acquire_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the drain flag, or leave `request` set for the running drain.
    fn request_drain(&self, request: &AtomicBool) -> bool {
        request.store(true, Ordering::SeqCst);
        if self.try_acquire_drain() {
            request.store(false, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Run a drain in the background. The drain flag must already be held.
    fn spawn_drain(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.drain().await;
        });
    }

    fn interrupted(&self, epoch: u64) -> bool {
        self.disconnect_epoch.load(Ordering::SeqCst) != epoch
    }

    /// Drain the queue. The drain flag must already be held.
    ///
    /// If a pass is interrupted while a reconnect or retry was waiting on it,
    /// another pass runs before returning.
    async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        self.report_stale();

        loop {
            self.drain_pass(&mut report).await;

            let retried = self.retry_requested.swap(false, Ordering::SeqCst);
            let reconnected = self.reconnect_requested.swap(false, Ordering::SeqCst);
            let again =
                report.interrupted && (retried || (reconnected && self.status.get().is_connected()));
            if !again || !self.try_acquire_drain() {
                break;
            }
            tracing::info!("drain requested while interrupted, syncing again");
        }

        self.publish_state(None);
        tracing::info!(
            "drain finished: {} confirmed, {} failed, {} terminal, {} remaining{}",
            report.confirmed,
            report.failed,
            report.terminal,
            report.remaining,
            if report.interrupted { " (interrupted)" } else { "" }
        );
        report
    }

    /// One pass over the queue. The drain flag is released atomically with
    /// the final empty peek, so a concurrent enqueue either lands in this
    /// pass or starts the next drain.
    async fn drain_pass(&self, report: &mut DrainReport) {
        let epoch = self.disconnect_epoch.load(Ordering::SeqCst);
        let mut blocked: HashSet<String> = HashSet::new();
        let mut stop = false;
        report.interrupted = false;

        loop {
            let batch = {
                let queue = lock(&self.queue);
                let batch = if stop || self.interrupted(epoch) {
                    report.interrupted = true;
                    Vec::new()
                } else {
                    queue.peek_batch_excluding(self.config.batch_size.max(1), &blocked)
                };
                if batch.is_empty() {
                    report.remaining = queue.len();
                    self.draining.store(false, Ordering::Release);
                }
                batch
            };
            if batch.is_empty() {
                break;
            }

            let outcomes: Vec<PathOutcome> = stream::iter(group_by_path(batch))
                .map(|ops| self.dispatch_path(ops, epoch))
                .buffer_unordered(self.config.max_in_flight.max(1))
                .collect()
                .await;

            for outcome in outcomes {
                report.confirmed += outcome.confirmed;
                report.failed += outcome.failed;
                report.terminal += outcome.terminal;
                if let Some(path) = outcome.blocked {
                    blocked.insert(path);
                }
                stop |= outcome.link_lost;
            }
        }
    }

    /// Dispatch one path's operations in enqueue order.
    async fn dispatch_path(&self, ops: Vec<PendingOperation>, epoch: u64) -> PathOutcome {
        let mut outcome = PathOutcome::default();

        for op in ops {
            if self.interrupted(epoch) {
                outcome.link_lost = true;
                break;
            }

            tracing::debug!("dispatching {} {} {}", op.id, op.kind, op.target_path);
            match with_timeout(self.config.dispatch_timeout, self.backend.apply(&op)).await {
                Ok(()) => {
                    if !self.confirm(&op.id) {
                        // Still queued; resending it this drain would loop
                        outcome.blocked = Some(op.target_path.clone());
                        break;
                    }
                    outcome.confirmed += 1;
                }
                Err(e) if e.is_connectivity() => {
                    tracing::debug!("dispatch of {} lost the link: {}", op.id, e);
                    outcome.link_lost = true;
                    break;
                }
                Err(e) => {
                    match self.record_failure(&op, &e) {
                        Recorded::Retry => outcome.failed += 1,
                        Recorded::Terminal => outcome.terminal += 1,
                        Recorded::Unrecorded => {}
                    }
                    outcome.blocked = Some(op.target_path.clone());
                    break;
                }
            }
        }

        outcome
    }

    /// Remove a confirmed write and resolve its ticket. Returns false if the
    /// queue could not be updated.
    fn confirm(&self, id: &OpId) -> bool {
        let removed = {
            let mut queue = lock(&self.queue);
            queue.dequeue(id)
        };
        if let Err(e) = removed {
            // Applied remotely but still queued: it will be resent and deduplicated by id
            tracing::error!("failed to remove confirmed operation {}: {}", id, e);
            return false;
        }
        self.publish_state(None);

        if let Some(tx) = lock(&self.waiters).remove(id) {
            let _ = tx.send(Ok(()));
        }
        true
    }

    fn record_failure(&self, op: &PendingOperation, error: &BackendError) -> Recorded {
        let marked = {
            let mut queue = lock(&self.queue);
            queue.mark_failed(&op.id)
        };

        match marked {
            Ok(Some(MarkFailed::Retry { attempt_count })) => {
                tracing::debug!(
                    "dispatch of {} failed (attempt {}): {}",
                    op.id,
                    attempt_count,
                    error
                );
                Recorded::Retry
            }
            Ok(Some(MarkFailed::Terminal(operation))) => {
                let failure = TerminalFailure {
                    operation,
                    reason: error.to_string(),
                };
                tracing::warn!("{}", failure);

                self.failed_count.fetch_add(1, Ordering::SeqCst);
                self.publish_state(None);

                if let Some(tx) = lock(&self.waiters).remove(&op.id) {
                    let _ = tx.send(Err(failure.clone()));
                }
                if let Some(callback) = &self.on_terminal_failure {
                    callback(&failure);
                }
                self.failures.emit(failure);
                Recorded::Terminal
            }
            Ok(None) => Recorded::Unrecorded,
            Err(e) => {
                tracing::error!("failed to record failure of {}: {}", op.id, e);
                Recorded::Unrecorded
            }
        }
    }

    fn report_stale(&self) {
        let Ok(older_than) = chrono::Duration::from_std(self.config.stale_after) else {
            return;
        };
        let now = Utc::now();
        let queue = lock(&self.queue);
        for op in queue.stale(older_than, now) {
            tracing::warn!(
                "operation {} on {} has been queued for {}s",
                op.id,
                op.target_path,
                op.age(now).num_seconds()
            );
        }
    }
}

/// Split a FIFO batch into per-path runs, preserving order within each path.
fn group_by_path(batch: Vec<PendingOperation>) -> Vec<Vec<PendingOperation>> {
    let mut groups: Vec<Vec<PendingOperation>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for op in batch {
        match index.get(&op.target_path) {
            Some(&i) => groups[i].push(op),
            None => {
                index.insert(op.target_path.clone(), groups.len());
                groups.push(vec![op]);
            }
        }
    }

    groups
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
