//! Bus error types

use thiserror::Error;

/// Errors that can occur talking to the shared bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unreachable: {0}")]
    Connectivity(String),

    #[error("key {key:?} still absent after {attempts} attempts")]
    RetriesExhausted { key: String, attempts: u32 },
}

impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        BusError::Connectivity(err.to_string())
    }
}

impl BusError {
    /// Connectivity failures are retried by callers; an exhausted bounded
    /// retry is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Connectivity(_))
    }
}
