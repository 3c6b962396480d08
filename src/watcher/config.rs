//! Capture watcher configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the [`CaptureWatcher`](super::CaptureWatcher)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Directory to watch, non-recursive.
    pub path: PathBuf,

    /// Glob pattern a preview filename must match.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Directory scan interval in milliseconds.
    #[serde(rename = "scan-interval-ms", default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Wait after a creation event before the first header read, so a file
    /// still being written is not picked up half-done.
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Optional bound on header-read retries. `None` retries forever.
    #[serde(rename = "max-read-attempts")]
    pub max_read_attempts: Option<u32>,
}

fn default_pattern() -> String {
    "preview.fits".to_string()
}

fn default_scan_interval_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            pattern: default_pattern(),
            scan_interval_ms: default_scan_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            max_read_attempts: None,
        }
    }
}

impl WatcherConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
