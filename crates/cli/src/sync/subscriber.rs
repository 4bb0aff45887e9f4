// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Live collection subscriptions that survive connectivity loss.
//!
//! Each subscription runs a small task that follows the connection status:
//! it listens while connected, drops the feed on disconnect, and listens
//! again once connected. Consumers only ever see snapshots, plus at most one
//! error for a query the backend refuses outright.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tt_core::{ConnectionStatus, Query, Snapshot};

use super::backend::{with_timeout, Backend, BackendError, BackendResult, SnapshotFeed};
use super::coordinator::SyncCoordinator;
use super::monitor::ConnectivityMonitor;
use super::publish::{lock, StatePublisher, Subscription};

/// Configuration for live subscriptions.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Wait before listening again after the link drops while still connected.
    pub resubscribe_delay: Duration,
    /// Max time to wait for the backend to open a feed.
    pub listen_timeout: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        SubscriberConfig {
            resubscribe_delay: Duration::from_secs(2),
            listen_timeout: Duration::from_secs(10),
        }
    }
}

/// Anything that publishes the connection status.
pub trait StatusSource: Send + Sync + 'static {
    fn status_stream(&self) -> Subscription<ConnectionStatus>;
}

impl StatusSource for StatePublisher<ConnectionStatus> {
    fn status_stream(&self) -> Subscription<ConnectionStatus> {
        self.subscribe()
    }
}

impl StatusSource for ConnectivityMonitor {
    fn status_stream(&self) -> Subscription<ConnectionStatus> {
        self.observe()
    }
}

impl<B: Backend> StatusSource for SyncCoordinator<B> {
    fn status_stream(&self) -> Subscription<ConnectionStatus> {
        self.connection_status_stream()
    }
}

type SnapshotCache = Arc<Mutex<HashMap<Query, Snapshot>>>;

/// Keeps consumers pushed with the latest snapshot of remote collections.
pub struct LiveCollectionSubscriber<B> {
    config: SubscriberConfig,
    backend: Arc<B>,
    status: Arc<dyn StatusSource>,
    cache: SnapshotCache,
}

impl<B: Backend> LiveCollectionSubscriber<B> {
    pub fn new(config: SubscriberConfig, backend: Arc<B>, status: Arc<dyn StatusSource>) -> Self {
        LiveCollectionSubscriber {
            config,
            backend,
            status,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start following a query.
    ///
    /// If the query was seen before, its cached snapshot is emitted first.
    /// Fresh snapshots follow whenever the backend is reachable.
    pub fn subscribe(&self, query: Query) -> tt_core::Result<LiveSubscription> {
        query.validate()?;

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let latest = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();

        let task = FeedTask {
            query: query.clone(),
            config: self.config.clone(),
            backend: Arc::clone(&self.backend),
            status: self.status.status_stream(),
            cache: Arc::clone(&self.cache),
            latest: Arc::clone(&latest),
            snapshots: snapshot_tx,
            errors: error_tx,
            cancel: cancel.clone(),
        };
        tracing::debug!("subscribing to {}", query);
        tokio::spawn(task.run());

        Ok(LiveSubscription {
            query,
            snapshots: Subscription::new(snapshot_rx),
            errors: Subscription::new(error_rx),
            latest,
            cancel,
        })
    }

    /// Last snapshot received for a query, if any.
    pub fn cached(&self, query: &Query) -> Option<Snapshot> {
        lock(&self.cache).get(query).cloned()
    }
}

/// Next item from a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Snapshot(Snapshot),
    Error(BackendError),
}

/// A consumer's handle on one live query.
///
/// Dropping the handle unsubscribes.
pub struct LiveSubscription {
    query: Query,
    snapshots: Subscription<Snapshot>,
    errors: Subscription<BackendError>,
    latest: Arc<Mutex<Option<Snapshot>>>,
    cancel: CancellationToken,
}

impl LiveSubscription {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` after unsubscribing or once the query has failed.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.snapshots.next().await
    }

    /// Wait for the query error, delivered at most once.
    pub async fn next_error(&mut self) -> Option<BackendError> {
        self.errors.next().await
    }

    /// Wait for the next snapshot or the query error, whichever comes first.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        tokio::select! {
            Some(error) = self.errors.next() => Some(LiveEvent::Error(error)),
            Some(snapshot) = self.snapshots.next() => Some(LiveEvent::Snapshot(snapshot)),
            else => None,
        }
    }

    /// The most recent snapshot emitted, if any.
    pub fn latest(&self) -> Option<Snapshot> {
        lock(&self.latest).clone()
    }

    /// False once unsubscribed or after a query error.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop emission and release the backend feed. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("unsubscribing from {}", self.query);
        }
        self.cancel.cancel();
        self.snapshots.cancel();
        self.errors.cancel();
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How following one feed ended.
enum FeedEnd {
    Cancelled,
    /// Status left `connected`.
    Disconnected,
    /// The feed closed or failed on the link while still connected.
    Lost,
    /// The backend refused the query.
    Failed(BackendError),
}

enum Event {
    Cancelled,
    Status(Option<ConnectionStatus>),
    Item(Option<BackendResult<Snapshot>>),
}

struct FeedTask<B> {
    query: Query,
    config: SubscriberConfig,
    backend: Arc<B>,
    status: Subscription<ConnectionStatus>,
    cache: SnapshotCache,
    latest: Arc<Mutex<Option<Snapshot>>>,
    snapshots: mpsc::UnboundedSender<Snapshot>,
    errors: mpsc::UnboundedSender<BackendError>,
    cancel: CancellationToken,
}

impl<B: Backend> FeedTask<B> {
    async fn run(mut self) {
        let cached = lock(&self.cache).get(&self.query).cloned();
        if let Some(snapshot) = cached {
            self.emit(snapshot.cached());
        }

        let mut connected = false;
        loop {
            if !connected {
                match self.wait_for_connected().await {
                    Some(()) => connected = true,
                    None => break,
                }
            }

            let listened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = with_timeout(
                    self.config.listen_timeout,
                    self.backend.listen(&self.query),
                ) => result,
            };

            let end = match listened {
                Ok(feed) => self.follow(feed).await,
                Err(e) if e.is_connectivity() => FeedEnd::Lost,
                Err(e) => FeedEnd::Failed(e),
            };

            match end {
                FeedEnd::Cancelled => break,
                FeedEnd::Disconnected => {
                    tracing::debug!("{}: paused while disconnected", self.query);
                    connected = false;
                }
                FeedEnd::Lost => {
                    tracing::debug!("{}: feed lost, listening again", self.query);
                    match self.pause().await {
                        Some(still_connected) => connected = still_connected,
                        None => break,
                    }
                }
                FeedEnd::Failed(e) => {
                    tracing::warn!("{}: {}", self.query, e);
                    if !self.cancel.is_cancelled() {
                        let _ = self.errors.send(e);
                    }
                    break;
                }
            }
        }

        // Marks the handle inactive whether we stopped on request or on error
        self.cancel.cancel();
    }

    /// Wait for a `connected` reading. `None` if cancelled or the source is gone.
    async fn wait_for_connected(&mut self) -> Option<()> {
        loop {
            let reading = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                reading = self.status.next() => reading?,
            };
            if reading.is_connected() {
                return Some(());
            }
        }
    }

    /// Back off after a lost feed: the resubscribe delay or the next status
    /// change, whichever comes first. Returns whether we are still connected.
    async fn pause(&mut self) -> Option<bool> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            reading = self.status.next() => reading.map(|s| s.is_connected()),
            _ = tokio::time::sleep(self.config.resubscribe_delay) => Some(true),
        }
    }

    async fn follow(&mut self, mut feed: SnapshotFeed) -> FeedEnd {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Event::Cancelled,
                reading = self.status.next() => Event::Status(reading),
                item = feed.recv() => Event::Item(item),
            };

            match event {
                Event::Cancelled | Event::Status(None) => return FeedEnd::Cancelled,
                Event::Status(Some(status)) if !status.is_connected() => {
                    return FeedEnd::Disconnected
                }
                Event::Status(Some(_)) => {}
                Event::Item(Some(Ok(snapshot))) => {
                    lock(&self.cache).insert(self.query.clone(), snapshot.clone());
                    self.emit(snapshot);
                }
                Event::Item(Some(Err(e))) if e.is_connectivity() => return FeedEnd::Lost,
                Event::Item(Some(Err(e))) => return FeedEnd::Failed(e),
                Event::Item(None) => return FeedEnd::Lost,
            }
        }
    }

    fn emit(&self, snapshot: Snapshot) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::debug!(
            "{}: revision {} with {} document(s){}",
            self.query,
            snapshot.revision,
            snapshot.len(),
            if snapshot.from_cache { " (cached)" } else { "" }
        );
        *lock(&self.latest) = Some(snapshot.clone());
        let _ = self.snapshots.send(snapshot);
    }
}

#[cfg(test)]
#[path = "subscriber_tests.rs"]
mod tests;
