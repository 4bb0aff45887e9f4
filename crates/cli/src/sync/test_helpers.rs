// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tt_core::{Document, PendingOperation, Query, Snapshot};

use super::backend::{Backend, BackendError, BackendFuture, BackendResult, SnapshotFeed};
use super::publish::Subscription;

/// How the mock answers writes to one path.
#[derive(Debug, Clone)]
pub enum WriteScript {
    /// Fail the next `n` writes with `error`, then succeed.
    FailTimes(usize, BackendError),
    /// Fail every write with `error`.
    AlwaysFail(BackendError),
}

#[derive(Default)]
struct MockState {
    reachable: bool,
    ping_delay: Option<Duration>,
    apply_delay: Option<Duration>,
    /// Consumed by the next listen call.
    listen_delay: Option<Duration>,
    scripts: HashMap<String, WriteScript>,
    /// Every dispatch attempt, in arrival order.
    dispatched: Vec<PendingOperation>,
    /// Writes that succeeded, in order.
    applied: Vec<PendingOperation>,
    collections: HashMap<String, (u64, Vec<Document>)>,
    query_errors: HashMap<String, String>,
    listeners: Vec<(Query, mpsc::Sender<BackendResult<Snapshot>>)>,
    listen_calls: usize,
    pings: usize,
}

/// Scripted in-memory document store.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockBackend {
    /// A backend that answers pings.
    pub fn reachable() -> Self {
        let backend = MockBackend::default();
        backend.set_reachable(true);
        backend
    }

    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.state.lock().unwrap();
        state.reachable = reachable;
        if !reachable {
            // Losing the link closes every live feed
            state.listeners.clear();
        }
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        self.state.lock().unwrap().ping_delay = Some(delay);
    }

    pub fn set_apply_delay(&self, delay: Duration) {
        self.state.lock().unwrap().apply_delay = Some(delay);
    }

    /// Make the next listen call hang for `delay` before answering.
    pub fn delay_next_listen(&self, delay: Duration) {
        self.state.lock().unwrap().listen_delay = Some(delay);
    }

    pub fn script(&self, path: &str, script: WriteScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(path.to_string(), script);
    }

    pub fn dispatched(&self) -> Vec<PendingOperation> {
        self.state.lock().unwrap().dispatched.clone()
    }

    pub fn applied(&self) -> Vec<PendingOperation> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn applied_paths(&self) -> Vec<String> {
        self.applied().into_iter().map(|op| op.target_path).collect()
    }

    pub fn pings(&self) -> usize {
        self.state.lock().unwrap().pings
    }

    pub fn listen_calls(&self) -> usize {
        self.state.lock().unwrap().listen_calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_query_error(&self, collection: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .query_errors
            .insert(collection.to_string(), message.to_string());
    }

    pub fn clear_query_error(&self, collection: &str) {
        self.state.lock().unwrap().query_errors.remove(collection);
    }

    /// Feeds still held open by a subscriber.
    pub fn listener_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.listeners.retain(|(_, tx)| !tx.is_closed());
        state.listeners.len()
    }

    /// Replace a collection's documents and push the change to listeners.
    pub fn set_documents(&self, collection: &str, documents: Vec<Document>) {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .collections
            .entry(collection.to_string())
            .or_insert((0, Vec::new()));
        entry.0 += 1;
        entry.1 = documents;
        let (revision, documents) = entry.clone();

        state.listeners.retain(|(query, tx)| {
            if query.collection != collection {
                return !tx.is_closed();
            }
            let snapshot = Snapshot::new(query.clone(), documents.clone(), revision);
            tx.try_send(Ok(snapshot)).is_ok()
        });
    }

    /// Close every live feed as if the link dropped, without changing reachability.
    pub fn drop_feeds(&self) {
        self.state.lock().unwrap().listeners.clear();
    }

    fn snapshot_for(state: &MockState, query: &Query) -> Snapshot {
        let (revision, documents) = state
            .collections
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        Snapshot::new(query.clone(), documents, revision)
    }
}

impl Backend for MockBackend {
    fn ping(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let (reachable, delay) = {
                let mut state = self.state.lock().unwrap();
                state.pings += 1;
                (state.reachable, state.ping_delay)
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if reachable {
                Ok(())
            } else {
                Err(BackendError::Unreachable("mock offline".into()))
            }
        })
    }

    fn apply<'a>(&'a self, op: &'a PendingOperation) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = {
                let mut state = self.state.lock().unwrap();
                state.dispatched.push(op.clone());
                state.apply_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let result = {
                let mut state = self.state.lock().unwrap();
                if !state.reachable {
                    Err(BackendError::Unreachable("mock offline".into()))
                } else {
                    let outcome = match state.scripts.get_mut(&op.target_path) {
                        Some(WriteScript::AlwaysFail(err)) => Err(err.clone()),
                        Some(WriteScript::FailTimes(n, err)) if *n > 0 => {
                            *n -= 1;
                            Err(err.clone())
                        }
                        _ => Ok(()),
                    };
                    if outcome.is_ok() {
                        state.applied.push(op.clone());
                    }
                    outcome
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn listen<'a>(&'a self, query: &'a Query) -> BackendFuture<'a, SnapshotFeed> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state.listen_calls += 1;
                state.listen_delay.take()
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if !state.reachable {
                return Err(BackendError::Unreachable("mock offline".into()));
            }
            if let Some(message) = state.query_errors.get(&query.collection) {
                return Err(BackendError::Query(message.clone()));
            }

            let (tx, rx) = mpsc::channel(64);
            let _ = tx.try_send(Ok(Self::snapshot_for(&state, query)));
            state.listeners.push((query.clone(), tx));
            Ok(rx)
        })
    }
}

/// Await the first value matching `pred`, failing the test after a long (virtual) wait.
pub async fn wait_for<T, F>(sub: &mut Subscription<T>, mut pred: F) -> T
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            match sub.next().await {
                Some(value) if pred(&value) => return value,
                Some(_) => continue,
                None => panic!("subscription ended before condition was met"),
            }
        }
    })
    .await
    .unwrap()
}

/// Drain every value currently buffered in a subscription.
pub fn drain<T>(sub: &mut Subscription<T>) -> Vec<T> {
    let mut values = Vec::new();
    while let Some(value) = sub.try_next() {
        values.push(value);
    }
    values
}

/// A document for tests.
pub fn doc(path: &str, data: serde_json::Value) -> Document {
    Document {
        path: path.to_string(),
        data,
    }
}
