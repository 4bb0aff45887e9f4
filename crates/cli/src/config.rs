// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration management.
//!
//! Configuration is read from TOML. Lookup order:
//! - the path given with `--config`
//! - `./tether.toml`
//! - `<config dir>/tether/config.toml`
//! - built-in defaults
//!
//! Every key is optional; missing keys take their default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::{MonitorConfig, SubscriberConfig, SyncConfig};

const APP_DIR_NAME: &str = "tether";
const LOCAL_CONFIG_FILE_NAME: &str = "tether.toml";
const CONFIG_FILE_NAME: &str = "config.toml";
const QUEUE_FILE_NAME: &str = "queue.jsonl";

/// Why a configuration was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file is not valid TOML or has a value of the wrong type.
    #[error("{}: {}", .path.display(), .message)]
    Parse { path: PathBuf, message: String },

    #[error("{0}")]
    InvalidUrl(String),

    /// A limit that must be positive was set to zero.
    #[error("{0} must be greater than 0")]
    ZeroLimit(&'static str),

    #[error("queue_path cannot be empty")]
    EmptyQueuePath,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue file location (default: `<data dir>/tether/queue.jsonl`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_path: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub monitor: MonitorSection,
    pub sync: SyncSection,
    pub subscriber: SubscriberSection,
}

/// Remote document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// WebSocket URL: `ws://...` or `wss://...`.
    pub url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: "ws://localhost:7890".to_string(),
        }
    }
}

impl RemoteConfig {
    /// Validates that the URL is a WebSocket URL with a host.
    ///
    /// Returns an error message if the URL is invalid.
    pub fn validate_url(&self) -> Option<String> {
        let rest = self
            .url
            .strip_prefix("ws://")
            .or_else(|| self.url.strip_prefix("wss://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => None,
            Some(_) => Some(format!("remote URL '{}' has no host", self.url)),
            None => Some(format!(
                "invalid remote URL '{}': must be ws:// or wss://",
                self.url
            )),
        }
    }
}

/// Connectivity monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// How long a loss must persist before reporting disconnected (default: 3000).
    pub grace_ms: u64,
    /// Max time to wait for a probe round trip (default: 5000).
    pub probe_timeout_ms: u64,
    /// Delay between probes while reconnecting (default: 2000).
    pub probe_interval_ms: u64,
    /// Heartbeat ping interval while connected (default: 15000). 0 = disabled.
    pub heartbeat_interval_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        MonitorSection {
            grace_ms: 3_000,
            probe_timeout_ms: 5_000,
            probe_interval_ms: 2_000,
            heartbeat_interval_ms: 15_000,
        }
    }
}

/// Queue draining tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Failed attempts before a write fails terminally (default: 5).
    pub max_attempts: u32,
    /// Writes in flight across distinct paths (default: 4).
    pub max_in_flight: usize,
    /// Operations taken from the queue per drain step (default: 32).
    pub batch_size: usize,
    /// Max time to wait for one write (default: 10000).
    pub dispatch_timeout_ms: u64,
    /// Age after which a queued write is reported as stale (default: one day).
    pub stale_after_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            max_attempts: 5,
            max_in_flight: 4,
            batch_size: 32,
            dispatch_timeout_ms: 10_000,
            stale_after_secs: 86_400,
        }
    }
}

/// Live subscription tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberSection {
    /// Wait before listening again after a feed drops (default: 2000).
    pub resubscribe_delay_ms: u64,
    /// Max time to wait for a feed to open (default: 10000).
    pub listen_timeout_ms: u64,
}

impl Default for SubscriberSection {
    fn default() -> Self {
        SubscriberSection {
            resubscribe_delay_ms: 2_000,
            listen_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or discover it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be parsed or fails validation,
    /// and [`Error::Io`] if an explicit path cannot be read.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config(),
        };
        let config = match path {
            Some(path) => Self::load_file(&path)?,
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse one configuration file without validating it.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::from(ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(message) = self.remote.validate_url() {
            return Err(ConfigError::InvalidUrl(message).into());
        }
        let limits = [
            ("sync.max_attempts", self.sync.max_attempts as u64),
            ("sync.max_in_flight", self.sync.max_in_flight as u64),
            ("sync.batch_size", self.sync.batch_size as u64),
            ("sync.dispatch_timeout_ms", self.sync.dispatch_timeout_ms),
            ("monitor.probe_timeout_ms", self.monitor.probe_timeout_ms),
            ("monitor.probe_interval_ms", self.monitor.probe_interval_ms),
            ("subscriber.listen_timeout_ms", self.subscriber.listen_timeout_ms),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(key).into());
            }
        }
        if matches!(&self.queue_path, Some(path) if path.as_os_str().is_empty()) {
            return Err(ConfigError::EmptyQueuePath.into());
        }
        Ok(())
    }

    /// Queue file location, falling back to the data directory.
    pub fn queue_path(&self) -> PathBuf {
        match &self.queue_path {
            Some(path) => path.clone(),
            None => data_dir().join(QUEUE_FILE_NAME),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let m = &self.monitor;
        MonitorConfig {
            grace: Duration::from_millis(m.grace_ms),
            probe_timeout: Duration::from_millis(m.probe_timeout_ms),
            probe_interval: Duration::from_millis(m.probe_interval_ms),
            heartbeat_interval: match m.heartbeat_interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_in_flight: self.sync.max_in_flight,
            batch_size: self.sync.batch_size,
            dispatch_timeout: Duration::from_millis(self.sync.dispatch_timeout_ms),
            stale_after: Duration::from_secs(self.sync.stale_after_secs),
        }
    }

    pub fn subscriber_config(&self) -> SubscriberConfig {
        SubscriberConfig {
            resubscribe_delay: Duration::from_millis(self.subscriber.resubscribe_delay_ms),
            listen_timeout: Duration::from_millis(self.subscriber.listen_timeout_ms),
        }
    }
}

/// First existing config file in the lookup order, if any.
fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join(APP_DIR_NAME).join(CONFIG_FILE_NAME);
    user.is_file().then_some(user)
}

/// Directory for persistent state.
///
/// Uses `$XDG_DATA_HOME/tether` or the platform equivalent, falling back
/// to `./.tether` when no data directory is known.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".tether"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
