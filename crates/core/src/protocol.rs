// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between a client and the document store.
//!
//! The protocol is simple:
//! - Client sends pings, writes and listen requests
//! - Server answers pings and writes by id, and pushes snapshots for listens

use serde::{Deserialize, Serialize};

use crate::op::PendingOperation;
use crate::query::{Query, Snapshot};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive and reachability probe.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },

    /// Apply one queued write.
    ///
    /// The operation id lets the server drop duplicates of a write that was
    /// applied but never acknowledged.
    Write { request_id: u64, op: PendingOperation },

    /// Start streaming snapshots for a query on this connection.
    Listen { query: Query },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// The write was applied.
    Ack { request_id: u64 },

    /// The write failed validation and will never be accepted as is.
    Rejected { request_id: u64, reason: String },

    /// The write could not be applied right now.
    Error { request_id: u64, message: String },

    /// Current state of a listened collection.
    Snapshot { snapshot: Snapshot },

    /// The listened query cannot be served (permission denied, malformed).
    QueryError { message: String },
}

impl ClientMessage {
    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Creates a Write message.
    pub fn write(request_id: u64, op: PendingOperation) -> Self {
        ClientMessage::Write { request_id, op }
    }

    /// Creates a Listen message.
    pub fn listen(query: Query) -> Self {
        ClientMessage::Listen { query }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Ack message.
    pub fn ack(request_id: u64) -> Self {
        ServerMessage::Ack { request_id }
    }

    /// Creates a Rejected message.
    pub fn rejected(request_id: u64, reason: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            request_id,
            reason: reason.into(),
        }
    }

    /// Creates an Error message.
    pub fn error(request_id: u64, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            request_id,
            message: message.into(),
        }
    }

    /// Creates a Snapshot message.
    pub fn snapshot(snapshot: Snapshot) -> Self {
        ServerMessage::Snapshot { snapshot }
    }

    /// Creates a QueryError message.
    pub fn query_error(message: impl Into<String>) -> Self {
        ServerMessage::QueryError {
            message: message.into(),
        }
    }

    /// The request or ping id this message answers, if any.
    pub fn reply_to(&self) -> Option<u64> {
        match self {
            ServerMessage::Pong { id } => Some(*id),
            ServerMessage::Ack { request_id }
            | ServerMessage::Rejected { request_id, .. }
            | ServerMessage::Error { request_id, .. } => Some(*request_id),
            ServerMessage::Snapshot { .. } | ServerMessage::QueryError { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
