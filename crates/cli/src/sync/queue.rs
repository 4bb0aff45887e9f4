// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue of writes awaiting backend confirmation.
//!
//! Uses JSONL format for durability - each operation is written as a single line
//! and fsynced immediately. Removals and attempt updates rewrite the file through
//! a temp file and rename, so a crash leaves either the old or the new log.
//!
//! The in-memory list mirrors the file and is the FIFO dispatch order.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use tt_core::{OpId, OperationDraft, PendingOperation};

use crate::id::generate_unique_op_id;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The submitted operation is malformed.
    #[error("invalid operation: {0}")]
    Invalid(#[from] tt_core::Error),

    /// Another process owns the queue file.
    #[error("queue {0} is locked by another process")]
    Locked(PathBuf),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Outcome of recording a failed dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkFailed {
    /// The operation stays queued and will be retried on the next drain.
    Retry { attempt_count: u32 },
    /// The attempt budget is spent; the operation has left the queue.
    Terminal(PendingOperation),
}

/// Ordered, persisted log of pending operations.
pub struct OperationQueue {
    /// Path to the queue file.
    path: PathBuf,
    ops: Vec<PendingOperation>,
    /// Failed dispatches allowed before an operation becomes terminal.
    max_attempts: u32,
    /// Mixed into id generation so ids differ within one timestamp.
    nonce: u64,
    /// Held for the lifetime of the queue; releases the advisory lock on drop.
    _lock: File,
}

impl OperationQueue {
    /// Open or create the queue at `path`, loading any persisted operations.
    ///
    /// Fails with [`QueueError::Locked`] if another process has it open.
    pub fn open(path: &Path, max_attempts: u32) -> QueueResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(path))?;
        lock.try_lock_exclusive()
            .map_err(|_| QueueError::Locked(path.to_path_buf()))?;

        // Ensure the file exists (create if not)
        OpenOptions::new().create(true).append(true).open(path)?;
        let ops = load(path)?;

        Ok(OperationQueue {
            path: path.to_path_buf(),
            nonce: ops.len() as u64,
            ops,
            max_attempts: max_attempts.max(1),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Validate, stamp and append an operation.
    ///
    /// The operation is persisted to disk before its id is returned.
    pub fn enqueue(&mut self, draft: OperationDraft) -> QueueResult<OpId> {
        draft.validate()?;

        let enqueued_at = Utc::now();
        self.nonce = self.nonce.wrapping_add(1);
        let id = generate_unique_op_id(&draft.target_path, &enqueued_at, self.nonce, |id| {
            self.ops.iter().any(|op| op.id.as_str() == id)
        });
        let op = PendingOperation::from_draft(id.clone(), draft, enqueued_at);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(&op)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;

        self.ops.push(op);
        Ok(id)
    }

    /// Remove a confirmed operation.
    ///
    /// Returns false, without touching the file, if `id` is not queued.
    /// If the file cannot be rewritten the operation stays queued.
    pub fn dequeue(&mut self, id: &OpId) -> QueueResult<bool> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        let mut ops = self.ops.clone();
        ops.remove(index);
        self.commit(ops)?;
        Ok(true)
    }

    /// Up to `limit` operations in FIFO order, without removing them.
    pub fn peek_batch(&self, limit: usize) -> Vec<PendingOperation> {
        self.ops.iter().take(limit).cloned().collect()
    }

    /// Like [`peek_batch`](Self::peek_batch), skipping operations on `blocked` paths.
    pub fn peek_batch_excluding(
        &self,
        limit: usize,
        blocked: &HashSet<String>,
    ) -> Vec<PendingOperation> {
        self.ops
            .iter()
            .filter(|op| !blocked.contains(&op.target_path))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Record a failed dispatch.
    ///
    /// Once `attempt_count` reaches the ceiling the operation is removed and
    /// returned as [`MarkFailed::Terminal`]. Returns `None` for an unknown id.
    /// On error neither the file nor the queue has changed.
    pub fn mark_failed(&mut self, id: &OpId) -> QueueResult<Option<MarkFailed>> {
        let Some(index) = self.position(id) else {
            return Ok(None);
        };

        let mut ops = self.ops.clone();
        let attempt_count = ops[index].attempt_count.saturating_add(1);
        ops[index].attempt_count = attempt_count;

        let outcome = if attempt_count >= self.max_attempts {
            MarkFailed::Terminal(ops.remove(index))
        } else {
            MarkFailed::Retry { attempt_count }
        };
        self.commit(ops)?;
        Ok(Some(outcome))
    }

    /// All queued operations in FIFO order.
    pub fn peek_all(&self) -> &[PendingOperation] {
        &self.ops
    }

    pub fn get(&self, id: &OpId) -> Option<&PendingOperation> {
        self.ops.iter().find(|op| &op.id == id)
    }

    /// Get the number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations that have been waiting longer than `older_than` as of `now`.
    pub fn stale(&self, older_than: chrono::Duration, now: DateTime<Utc>) -> Vec<&PendingOperation> {
        self.ops
            .iter()
            .filter(|op| op.age(now) > older_than)
            .collect()
    }

    fn position(&self, id: &OpId) -> Option<usize> {
        self.ops.iter().position(|op| &op.id == id)
    }

    /// Persist `ops`, then adopt it as the in-memory list.
    fn commit(&mut self, ops: Vec<PendingOperation>) -> QueueResult<()> {
        rewrite(&self.path, &ops)?;
        self.ops = ops;
        Ok(())
    }
}

/// Replace the file at `path` with `ops` through a temp file and rename.
fn rewrite(path: &Path, ops: &[PendingOperation]) -> QueueResult<()> {
    let tmp = tmp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(&file);
        for op in ops {
            let json = serde_json::to_string(op)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read every operation in a queue file, skipping blank lines.
fn load(path: &Path) -> QueueResult<Vec<PendingOperation>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::new(file);
    let mut ops = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let op: PendingOperation = serde_json::from_str(&line)?;
        ops.push(op);
    }

    Ok(ops)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn lock_path(path: &Path) -> PathBuf {
    sibling_path(path, ".lock")
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
