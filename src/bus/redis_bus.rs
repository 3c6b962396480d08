//! Redis-backed bus client

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info, warn};

use super::{Bus, BusError, RetryPolicy};

/// [`Bus`] implementation over a Redis server.
///
/// Uses a multiplexed async connection; every operation clones the handle,
/// so the client is shareable across tasks without locking.
pub struct RedisBus {
    connection: MultiplexedConnection,
    policy: RetryPolicy,
}

impl RedisBus {
    /// Connect and verify the server with a ping.
    pub async fn connect(url: &str, policy: RetryPolicy) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_multiplexed_tokio_connection().await?;
        redis::cmd("PING")
            .query_async::<()>(&mut connection)
            .await?;
        info!(%url, "bus connection established");
        Ok(Self { connection, policy })
    }

    /// Connect, retrying at the policy's fixed interval while the server is
    /// unreachable.
    pub async fn connect_with_retry(url: &str, policy: RetryPolicy) -> Result<Self, BusError> {
        let mut attempts = 0u32;
        loop {
            match Self::connect(url, policy.clone()).await {
                Ok(bus) => return Ok(bus),
                Err(err) => {
                    attempts += 1;
                    if !policy.allows(attempts) {
                        return Err(err);
                    }
                    warn!(%url, attempt = attempts, error = %err, "waiting for bus connection");
                    tokio::time::sleep(policy.interval()).await;
                }
            }
        }
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn get(&self, key: &str) -> Result<String, BusError> {
        let mut attempts = 0u32;
        loop {
            let mut connection = self.connection.clone();
            match redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut connection)
                .await
            {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => debug!(%key, "key absent, retrying"),
                // A read failure blocks rather than skipping a cycle.
                Err(err) => warn!(%key, error = %err, "bus read failed, retrying"),
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
        let mut connection = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut connection)
            .await?;
        Ok(())
    }

    async fn shutdown_server(&self) -> Result<(), BusError> {
        let mut connection = self.connection.clone();
        // SHUTDOWN drops the connection instead of replying; the resulting
        // transport error means the server obeyed.
        let result = redis::cmd("SHUTDOWN")
            .arg("NOSAVE")
            .query_async::<()>(&mut connection)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_connection_dropped() || err.is_io_error() => {
                info!("bus server shutdown issued");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
