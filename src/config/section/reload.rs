//! `[reload]` section configuration.
//!
//! ```toml
//! [reload]
//! cooldown_ms = 2000          # Minimum time between two reloads
//! settle_ms = 300             # Wait for the editor to finish writing
//! ping_interval_secs = 30     # Keep-alive broadcast
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reload monitor and shutdown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub cooldown_ms: u64,
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub ping_interval_secs: u64,

    /// Grace period before a stalled shutdown is forced.
    pub shutdown_timeout_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2000,
            settle_ms: 300,
            poll_interval_ms: 100,
            ping_interval_secs: 30,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ReloadConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
