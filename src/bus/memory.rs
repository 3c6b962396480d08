//! In-process bus for tests and dry runs

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{Bus, BusError, RetryPolicy};

/// In-memory [`Bus`] with the same blocking-read semantics as the real one.
///
/// Writes replace the whole value under a mutex, so readers only ever see a
/// complete record.
#[derive(Debug, Default)]
pub struct MemoryBus {
    values: Mutex<HashMap<String, String>>,
    policy: RetryPolicy,
    shutdown_requested: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy {
            interval_ms: 10,
            max_attempts: None,
        })
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            policy,
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Whether `shutdown_server` has been issued.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Non-blocking read, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn get(&self, key: &str) -> Result<String, BusError> {
        let mut attempts = 0u32;
        loop {
            if let Some(value) = self.values.lock().unwrap().get(key) {
                return Ok(value.clone());
            }
            attempts += 1;
            if !self.policy.allows(attempts) {
                return Err(BusError::RetriesExhausted {
                    key: key.to_string(),
                    attempts,
                });
            }
            tokio::time::sleep(self.policy.interval()).await;
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BusError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn shutdown_server(&self) -> Result<(), BusError> {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        Ok(())
    }
}
