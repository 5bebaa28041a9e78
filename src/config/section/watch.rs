//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! extension = "html"          # Files that trigger a reload
//! recursive = true            # Descend into subdirectories
//! debounce_ms = 1000          # Quiet window per file
//! force_polling = false       # Skip OS notifications
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Extension of tracked files, without the dot.
    pub extension: String,

    /// Scan subdirectories.
    pub recursive: bool,

    /// Interval between mtime checks.
    pub poll_interval_ms: u64,

    /// Interval between rescans for new files.
    pub rescan_interval_secs: u64,

    /// Minimum time between two signals for the same file.
    pub debounce_ms: u64,

    /// Use polling even when OS notifications are available.
    pub force_polling: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extension: "html".to_string(),
            recursive: true,
            poll_interval_ms: 100,
            rescan_interval_secs: 30,
            debounce_ms: 1000,
            force_polling: false,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_watch_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.watch.extension(), "html");
        assert!(config.watch.recursive);
        assert_eq!(config.watch.poll_interval().as_millis(), 100);
        assert_eq!(config.watch.rescan_interval().as_secs(), 30);
        assert_eq!(config.watch.debounce().as_millis(), 1000);
        assert!(!config.watch.force_polling);
    }

    #[test]
    fn test_extension_leading_dot() {
        let config = test_parse_config("[watch]\nextension = \".htm\"");
        assert_eq!(config.watch.extension(), "htm");
    }
}
