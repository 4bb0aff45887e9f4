// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Live collection queries and the snapshots they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::op::validate_path;

/// A consumer's interest in a remote collection, e.g. `leaderboard/event1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Collection path.
    pub collection: String,
    /// Field to order documents by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Query {
            collection: collection.into(),
            order_by: None,
            descending: false,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_by = Some(field.into());
        self.descending = descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_path(&self.collection)
            .map_err(|_| Error::InvalidQuery(format!("bad collection '{}'", self.collection)))?;
        if self.limit == Some(0) {
            return Err(Error::InvalidQuery("limit must be positive".to_string()));
        }
        if matches!(&self.order_by, Some(field) if field.trim().is_empty()) {
            return Err(Error::InvalidQuery("order_by field is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        if let Some(field) = &self.order_by {
            let dir = if self.descending { "desc" } else { "asc" };
            write!(f, " order by {} {}", field, dir)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {}", limit)?;
        }
        Ok(())
    }
}

/// One document inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub data: serde_json::Value,
}

/// Immutable view of a collection at one point in time.
///
/// Snapshots are replaced wholesale on every update and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub query: Query,
    pub documents: Vec<Document>,
    /// Server revision of the collection, increasing with each change.
    pub revision: u64,
    pub received_at: DateTime<Utc>,
    /// True when served from the local cache rather than the backend.
    #[serde(default)]
    pub from_cache: bool,
}

impl Snapshot {
    pub fn new(query: Query, documents: Vec<Document>, revision: u64) -> Self {
        Snapshot {
            query,
            documents,
            revision,
            received_at: Utc::now(),
            from_cache: false,
        }
    }

    /// A copy of this snapshot marked as served from cache.
    pub fn cached(&self) -> Self {
        Snapshot {
            from_cache: true,
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
