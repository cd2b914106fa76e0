//! Tuning knobs for owners and watchers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BindResult, ValidationError};

/// Per-watcher queue sizes and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Max queued events before `EventSink::deliver` reports a full queue.
    pub event_queue_capacity: usize,
    /// Max queued control messages (refresher requests).
    pub control_queue_capacity: usize,
    /// How long a forced refresh waits for the watcher to hand over its rule.
    pub refresher_timeout_ms: u64,
    /// Watcher threads are named `<prefix>-<attribute>`.
    pub thread_name_prefix: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 1024,
            control_queue_capacity: 16,
            refresher_timeout_ms: 5_000,
            thread_name_prefix: "livebind".to_string(),
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub const fn refresher_timeout(&self) -> Duration {
        Duration::from_millis(self.refresher_timeout_ms)
    }
}

/// Owner inbox sizing plus the config handed to every watcher it spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerConfig {
    /// Max queued refresh requests. Watchers block when it is full.
    pub inbox_capacity: usize,
    pub watcher: WatcherConfig,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
            watcher: WatcherConfig::default(),
        }
    }
}

impl OwnerConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` for malformed input.
    pub fn from_json(input: &str) -> BindResult<Self> {
        serde_json::from_str(input).map_err(|e| {
            ValidationError::InvalidConfig {
                reason: e.to_string(),
            }
            .into()
        })
    }
}
