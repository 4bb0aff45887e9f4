// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connect and sync until interrupted.

use std::sync::Arc;

use tokio::sync::watch;

use super::{open_queue, runtime};
use crate::config::Config;
use crate::error::Result;
use crate::sync::{ConnectivityMonitor, SyncCoordinator, WebSocketBackend};

pub fn run(config: &Config) -> Result<()> {
    runtime()?.block_on(run_async(config))
}

async fn run_async(config: &Config) -> Result<()> {
    let queue = open_queue(config)?;
    let backend = Arc::new(WebSocketBackend::new(config.remote.url.clone()));
    tracing::info!("syncing {} with {}", config.queue_path().display(), backend.url());

    // No OS network signal here; heartbeats detect loss
    let (_reachability_tx, reachability) = watch::channel(true);
    let monitor =
        ConnectivityMonitor::spawn(config.monitor_config(), Arc::clone(&backend), reachability);

    let coordinator = SyncCoordinator::builder(config.sync_config(), backend, queue)
        .on_terminal_failure(|failure| eprintln!("error: {}", failure))
        .start(monitor.observe());

    let mut states = coordinator.state_stream();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = states.next() => match state {
                Some(state) => println!("{}", state),
                None => break,
            },
        }
    }

    coordinator.shutdown();
    monitor.stop();
    let pending = coordinator.pending_count();
    if pending > 0 {
        println!("{} operation(s) still queued", pending);
    }
    Ok(())
}
