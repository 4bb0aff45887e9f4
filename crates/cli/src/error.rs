// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::config::ConfigError;
use crate::sync::{BackendError, QueueError, TerminalFailure};

/// All possible errors surfaced by the tether library and CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}\n  hint: stop the running 'tether run' or point queue_path elsewhere")]
    QueueLocked(String),

    #[error("queue error: {0}")]
    Queue(QueueError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Invalid(#[from] tt_core::Error),

    #[error("invalid payload: {reason}\n  hint: payloads are JSON objects, e.g. '{{\"title\": \"hi\"}}'")]
    InvalidPayload { reason: String },

    #[error("write failed permanently: {0}")]
    WriteFailed(Box<TerminalFailure>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        if let QueueError::Locked(_) = &err {
            return Error::QueueLocked(err.to_string());
        }
        match err {
            QueueError::Invalid(inner) => Error::Invalid(inner),
            other => Error::Queue(other),
        }
    }
}

impl From<TerminalFailure> for Error {
    fn from(failure: TerminalFailure) -> Self {
        Error::WriteFailed(Box::new(failure))
    }
}

/// Result type alias using the tether error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
