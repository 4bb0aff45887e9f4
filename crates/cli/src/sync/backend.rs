// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Backend abstraction for the remote document store.
//!
//! Provides a trait-based seam that enables:
//! - Real WebSocket connections for production
//! - Scripted mock backends for unit testing
//!
//! Every remote interaction is an opaque request with a success, failure or
//! timeout outcome.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tt_core::{PendingOperation, Query, Snapshot};

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend did not answer in time.
    #[error("backend request timed out")]
    Timeout,

    /// The backend answered but could not serve the request right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write; retrying the same payload will not help.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// The query itself is invalid or not permitted.
    #[error("query failed: {0}")]
    Query(String),
}

impl BackendError {
    /// True for failures caused by the link rather than by the request.
    ///
    /// These never count against an operation's attempt budget and are never
    /// surfaced to subscription consumers.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Unreachable(_) | BackendError::Timeout)
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Boxed future returned by [`Backend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Live snapshot feed for one query.
///
/// The backend sends the current snapshot first and a new one on every
/// change. A closed feed means the link was lost.
pub type SnapshotFeed = mpsc::Receiver<BackendResult<Snapshot>>;

/// Remote document store.
///
/// This trait abstracts over the actual protocol, allowing for easy testing
/// with mock implementations. Methods take `&self` so that writes to
/// distinct paths can be dispatched concurrently.
pub trait Backend: Send + Sync + 'static {
    /// One round trip used to confirm the backend is reachable.
    fn ping(&self) -> BackendFuture<'_, ()>;

    /// Apply one queued write.
    fn apply<'a>(&'a self, op: &'a PendingOperation) -> BackendFuture<'a, ()>;

    /// Open a live feed of snapshots for a query.
    fn listen<'a>(&'a self, query: &'a Query) -> BackendFuture<'a, SnapshotFeed>;
}

/// Run a backend request with a bounded wait, mapping expiry to [`BackendError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout),
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
