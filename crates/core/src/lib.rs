// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tt-core: Shared data model for the tether sync layer
//!
//! This crate provides the value types exchanged between the sync layer,
//! its presentation consumers, and backend implementations: connection
//! status, pending operations, live queries and the wire protocol.

pub mod error;
pub mod op;
pub mod protocol;
pub mod query;
pub mod status;

pub use error::{Error, Result};
pub use op::{validate_path, OpId, OpKind, OperationDraft, PendingOperation};
pub use query::{Document, Query, Snapshot};
pub use status::{ConnectionStatus, SyncPhase, SyncState};
