// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending write operations.
//!
//! Every mutation submitted while the backend may be unreachable is staged
//! as a [`PendingOperation`]. An operation is:
//!
//! - Addressed: it targets one logical document path
//! - Stable: its id survives retries and process restarts
//! - Counted: each failed dispatch increments `attempt_count`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The mutation a pending operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }

    /// Whether operations of this kind must carry a payload.
    pub fn requires_payload(&self) -> bool {
        !matches!(self, OpKind::Delete)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OpKind::Create),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// Opaque identifier assigned to an operation at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(String);

impl OpId {
    pub fn new(id: impl Into<String>) -> Self {
        OpId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A write as submitted by a caller, before the queue assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDraft {
    pub kind: OpKind,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl OperationDraft {
    pub fn create(target_path: impl Into<String>, payload: serde_json::Value) -> Self {
        OperationDraft {
            kind: OpKind::Create,
            target_path: target_path.into(),
            payload: Some(payload),
        }
    }

    pub fn update(target_path: impl Into<String>, payload: serde_json::Value) -> Self {
        OperationDraft {
            kind: OpKind::Update,
            target_path: target_path.into(),
            payload: Some(payload),
        }
    }

    pub fn delete(target_path: impl Into<String>) -> Self {
        OperationDraft {
            kind: OpKind::Delete,
            target_path: target_path.into(),
            payload: None,
        }
    }

    /// Check path shape and payload presence against the kind.
    pub fn validate(&self) -> Result<()> {
        validate_path(&self.target_path)?;
        match (self.kind.requires_payload(), &self.payload) {
            (true, None) => Err(Error::MissingPayload {
                kind: self.kind.as_str(),
            }),
            (false, Some(_)) => Err(Error::UnexpectedPayload),
            _ => Ok(()),
        }
    }
}

/// A mutation not yet confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OpId,
    pub kind: OpKind,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
}

impl PendingOperation {
    /// Stamp a validated draft with its id and enqueue time.
    pub fn from_draft(id: OpId, draft: OperationDraft, enqueued_at: DateTime<Utc>) -> Self {
        PendingOperation {
            id,
            kind: draft.kind,
            target_path: draft.target_path,
            payload: draft.payload,
            enqueued_at,
            attempt_count: 0,
        }
    }

    /// Time spent in the queue as of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.enqueued_at
    }
}

/// Validate a logical document path such as `posts/p1`.
///
/// Paths are non-empty, `/`-separated, with no empty or whitespace-only
/// segments.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.split('/').any(|segment| segment.trim().is_empty()) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
