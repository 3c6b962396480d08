//! Control loop configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the [`ControlEngine`](super::ControlEngine)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Survey poll interval in seconds.
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay between hardware connect attempts, in seconds.
    #[serde(rename = "connect-retry-secs", default = "default_connect_retry_secs")]
    pub connect_retry_secs: u64,

    /// Image-ready poll interval in milliseconds.
    #[serde(rename = "image-ready-poll-ms", default = "default_image_ready_poll_ms")]
    pub image_ready_poll_ms: u64,

    /// Base directory for per-night session folders.
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Filter names by wheel position.
    #[serde(default = "default_filters")]
    pub filters: Vec<String>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_connect_retry_secs() -> u64 {
    5
}

fn default_image_ready_poll_ms() -> u64 {
    250
}

fn default_filters() -> Vec<String> {
    ["L", "R", "G", "B"].map(String::from).to_vec()
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            connect_retry_secs: default_connect_retry_secs(),
            image_ready_poll_ms: default_image_ready_poll_ms(),
            data_dir: PathBuf::from("."),
            filters: default_filters(),
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }

    pub fn image_ready_poll(&self) -> Duration {
        Duration::from_millis(self.image_ready_poll_ms)
    }
}
