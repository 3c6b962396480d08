//! Shared bus client
//!
//! The bus is a single-key-latest-value store used as an asynchronous
//! message channel between the two observatory nodes and the dashboard.
//! Each key holds exactly one current value; writes fully replace it. Reads
//! block, retrying at a fixed interval, until a value exists. "Retry
//! forever" is the intended default, bounded only by an explicit
//! operational knob in [`RetryPolicy`].

mod error;
mod memory;
mod redis_bus;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::BusError;
pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

/// Retry behavior for blocking reads and connect probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Fixed delay between attempts, in milliseconds.
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Optional upper bound on attempts. `None` preserves the original
    /// retry-forever semantic.
    #[serde(rename = "max-attempts")]
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// True when another attempt is allowed after `attempts` tries.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Client contract for the shared key-value bus.
///
/// No transactions and no subscriptions: consumers poll. `get` blocks until
/// the key exists; `set` atomically replaces the whole value.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Fetch the latest value of `key`, retrying at the policy's fixed
    /// interval until one exists.
    async fn get(&self, key: &str) -> Result<String, BusError>;

    /// Atomically overwrite `key` with `value`.
    async fn set(&self, key: &str, value: &str) -> Result<(), BusError>;

    /// Ask the bus server to shut down. Issued by the capture watcher on
    /// normal exit; a deliberate, documented side effect.
    async fn shutdown_server(&self) -> Result<(), BusError>;
}
