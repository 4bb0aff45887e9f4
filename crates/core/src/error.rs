// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for tt-core operations.

use thiserror::Error;

/// All possible errors raised while building or parsing core values.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidKind(String),

    #[error("invalid connection status: '{0}'\n  hint: valid statuses are: connected, disconnected, reconnecting")]
    InvalidStatus(String),

    #[error("invalid target path: '{0}'\n  hint: paths look like 'posts/p1' with no empty segments")]
    InvalidPath(String),

    #[error("{kind} operation requires a payload")]
    MissingPayload { kind: &'static str },

    #[error("delete operation must not carry a payload")]
    UnexpectedPayload,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for tt-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
