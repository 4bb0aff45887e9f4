// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline-first sync with a remote document store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ status ┌─────────────────┐ drain ┌─────────────┐
//! │ Connectivity │───────►│      Sync       │──────►│   Backend   │
//! │   Monitor    │        │   Coordinator   │◄──────│   (trait)   │
//! └──────────────┘        └─────────────────┘  ack  └─────────────┘
//!                           │      │      ▲               │
//!                   enqueue │      │      │ status        │ snapshots
//!                           ▼      │      │               ▼
//!                  ┌────────────┐  │  ┌─────────────────────────┐
//!                  │ Operation  │  │  │ LiveCollectionSubscriber│
//!                  │   Queue    │  │  └─────────────────────────┘
//!                  └────────────┘  ▼
//!                        status, pending count, failures
//! ```
//!
//! # Features
//!
//! - Debounced connectivity readings confirmed by a backend round trip
//! - Durable JSONL queue of writes made while offline
//! - Ordered per-path replay with bounded cross-path concurrency
//! - Bounded retries with terminal failures reported separately
//! - Live queries that resume after reconnect without consumer action
//! - Injectable backend trait for testing

mod backend;
mod coordinator;
mod monitor;
mod publish;
mod queue;
mod subscriber;
mod websocket;

pub use backend::{with_timeout, Backend, BackendError, BackendFuture, BackendResult, SnapshotFeed};
pub use coordinator::{
    DrainReport, SyncConfig, SyncCoordinator, SyncCoordinatorBuilder, TerminalFailure, Ticket,
    WriteOutcome,
};
pub use monitor::{ConnectivityMonitor, MonitorConfig};
pub use publish::{EventPublisher, StatePublisher, Subscription};
pub use queue::{MarkFailed, OperationQueue, QueueError, QueueResult};
pub use subscriber::{
    LiveCollectionSubscriber, LiveEvent, LiveSubscription, StatusSource, SubscriberConfig,
};
pub use websocket::WebSocketBackend;

#[cfg(test)]
mod test_helpers;
