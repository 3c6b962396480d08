//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bus::RetryPolicy;
use crate::control::ControlConfig;
use crate::watcher::WatcherConfig;

/// Shared bus connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,

    /// Blocking-read and connect retry behavior.
    pub retry: RetryPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            retry: RetryPolicy::default(),
        }
    }
}

impl BusConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Top-level configuration for both nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared bus connection
    pub bus: BusConfig,

    /// Capture watcher (producer node)
    pub watcher: WatcherConfig,

    /// Control loop (local node)
    pub control: ControlConfig,
}

impl Config {
    /// Load configuration with fallback chain: explicit path, then
    /// `.scopelink.yml` in the working directory, then the user config
    /// directory, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".scopelink.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("scopelink").join("scopelink.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Render a commented default config, for `scopelink config init`.
    pub fn default_file_contents() -> String {
        let defaults =
            serde_yaml::to_string(&Self::default()).expect("default config serializes");
        format!(
            "# scopelink configuration\n\
             #\n\
             # The watcher node and the control node read the same file; each\n\
             # uses its own section plus the shared bus settings.\n\
             {defaults}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bus.url(), "redis://localhost:6379");
        assert_eq!(config.control.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.watcher.pattern, "preview.fits");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "bus:\n  host: 10.0.0.5\nwatcher:\n  path: /data/previews\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bus.url(), "redis://10.0.0.5:6379");
        assert_eq!(config.watcher.path, PathBuf::from("/data/previews"));
        assert_eq!(config.control.poll_interval_secs, 5);
    }

    #[test]
    fn test_default_file_contents_parse_back() {
        let rendered = Config::default_file_contents();
        let config: Config = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(config.bus.port, 6379);
    }

    #[test]
    fn test_bounded_retry_from_yaml() {
        let yaml = "bus:\n  retry:\n    interval-ms: 200\n    max-attempts: 10\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bus.retry.max_attempts, Some(10));
        assert_eq!(config.bus.retry.interval(), Duration::from_millis(200));
    }
}
