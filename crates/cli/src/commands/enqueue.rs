// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Stage a write without contacting the remote.

use tt_core::{OpId, OpKind, OperationDraft};

use super::open_queue;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::OperationQueue;

pub fn run(config: &Config, kind: OpKind, path: &str, payload: Option<&str>) -> Result<()> {
    let mut queue = open_queue(config)?;
    let id = run_impl(&mut queue, kind, path, payload)?;
    println!("{}", id);
    Ok(())
}

pub(crate) fn run_impl(
    queue: &mut OperationQueue,
    kind: OpKind,
    path: &str,
    payload: Option<&str>,
) -> Result<OpId> {
    let payload = payload.map(parse_payload).transpose()?;
    let draft = OperationDraft {
        kind,
        target_path: path.to_string(),
        payload,
    };
    let id = queue.enqueue(draft)?;
    tracing::debug!("queued {} {} as {}", kind, path, id);
    Ok(id)
}

fn parse_payload(text: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::InvalidPayload {
            reason: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(Error::InvalidPayload {
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
