// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection and sync status values published to presentation layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Three-state reading of the link to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Backend confirmed reachable by a successful round trip.
    Connected,
    /// Backend unreachable past the grace window. Initial state.
    #[default]
    Disconnected,
    /// Reachability regained, waiting for the first successful round trip.
    Reconnecting,
}

impl ConnectionStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }

    /// Returns true if writes can be dispatched in this state.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// The ordered statuses to publish when moving from `self` to `target`.
    ///
    /// `disconnected` never jumps straight to `connected`; the path always
    /// passes through `reconnecting`. Empty when `self == target`.
    pub fn steps_to(&self, target: ConnectionStatus) -> Vec<ConnectionStatus> {
        match (self, target) {
            (a, b) if *a == b => Vec::new(),
            (ConnectionStatus::Disconnected, ConnectionStatus::Connected) => {
                vec![ConnectionStatus::Reconnecting, ConnectionStatus::Connected]
            }
            (_, b) => vec![b],
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            "reconnecting" => Ok(ConnectionStatus::Reconnecting),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Coordinator phase, a refinement of [`ConnectionStatus`].
///
/// `Syncing` is `connected` with writes still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Connected,
    Syncing,
    #[default]
    Disconnected,
    Reconnecting,
}

impl SyncPhase {
    /// Derive the phase from a status and the number of pending writes.
    pub fn from_parts(status: ConnectionStatus, pending: usize) -> Self {
        match status {
            ConnectionStatus::Connected if pending > 0 => SyncPhase::Syncing,
            ConnectionStatus::Connected => SyncPhase::Connected,
            ConnectionStatus::Disconnected => SyncPhase::Disconnected,
            ConnectionStatus::Reconnecting => SyncPhase::Reconnecting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Connected => "connected",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Disconnected => "disconnected",
            SyncPhase::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consistent view of the sync layer, published as a single value.
///
/// `pending` and `failed` are kept apart so that terminal failures can be
/// reported on their own ("1 change failed to sync").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncState {
    pub status: ConnectionStatus,
    pub phase: SyncPhase,
    /// Writes waiting for backend confirmation.
    pub pending: usize,
    /// Terminal failures since the last acknowledgement.
    pub failed: usize,
}

impl SyncState {
    pub fn new(status: ConnectionStatus, pending: usize, failed: usize) -> Self {
        SyncState {
            status,
            phase: SyncPhase::from_parts(status, pending),
            pending,
            failed,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            SyncPhase::Syncing => write!(f, "connected, syncing {} item(s)", self.pending)?,
            _ if self.pending > 0 => write!(f, "{} ({} pending)", self.phase, self.pending)?,
            _ => write!(f, "{}", self.phase)?,
        }
        if self.failed > 0 {
            write!(f, ", {} change(s) failed to sync", self.failed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
