// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod enqueue;
pub mod pending;
pub mod run;
pub mod watch;

use crate::config::Config;
use crate::error::Result;
use crate::sync::OperationQueue;

/// Helper to open the configured queue.
pub fn open_queue(config: &Config) -> Result<OperationQueue> {
    let path = config.queue_path();
    let queue = OperationQueue::open(&path, config.sync.max_attempts)?;
    Ok(queue)
}

/// Runtime for the commands that talk to the remote.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| crate::error::Error::Io(std::io::Error::other(format!("tokio: {}", e))))
}
