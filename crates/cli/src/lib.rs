// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether - offline-first sync with a remote document store.
//!
//! This crate provides the sync layer behind the `tether` CLI: writes are
//! staged in a durable queue while offline and replayed once the backend is
//! reachable, while consumers follow connection status, pending counts and
//! live collections through push-based subscriptions.
//!
//! # Main Components
//!
//! - [`ConnectivityMonitor`](sync::ConnectivityMonitor) - debounced connection status
//! - [`OperationQueue`](sync::OperationQueue) - durable log of pending writes
//! - [`SyncCoordinator`](sync::SyncCoordinator) - status state machine and queue draining
//! - [`LiveCollectionSubscriber`](sync::LiveCollectionSubscriber) - live queries across reconnects
//! - [`Config`] - TOML configuration
//! - [`Error`] - Error types for all operations
//!
//! # Wiring
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether::sync::{ConnectivityMonitor, OperationQueue, SyncCoordinator, WebSocketBackend};
//!
//! let config = tether::Config::load(None)?;
//! let backend = Arc::new(WebSocketBackend::new(config.remote.url.clone()));
//! let monitor = ConnectivityMonitor::spawn(config.monitor_config(), backend.clone(), reachability);
//! let queue = OperationQueue::open(&config.queue_path(), config.sync.max_attempts)?;
//! let coordinator = SyncCoordinator::start(config.sync_config(), backend, queue, monitor.observe());
//! ```

mod cli;
mod commands;

pub mod config;
pub mod error;
pub mod id;
pub mod sync;

pub use cli::{Cli, Command, KindArg, OutputFormat};
pub use config::{Config, ConfigError};
pub use error::{Error, Result};

/// Execute a CLI invocation. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Enqueue {
            kind,
            path,
            payload,
        } => commands::enqueue::run(&config, kind.into(), &path, payload.as_deref()),
        Command::Pending { output } => commands::pending::run(&config, output),
        Command::Run => commands::run::run(&config),
        Command::Watch {
            collection,
            limit,
            order_by,
            desc,
        } => commands::watch::run(&config, &collection, limit, order_by, desc),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
