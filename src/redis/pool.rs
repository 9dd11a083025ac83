//! Shared Redis connection handle for the durable registry backend.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

/// Lazily-initialized, shared Redis connection.
///
/// Wraps a multiplexed [`ConnectionManager`] that reconnects on error, so a
/// single handle can be cloned out to every invocation. The connection is
/// established on first use, not at startup; a worker that never touches the
/// registry never dials Redis.
pub struct RedisPool {
    client: Client,
    manager: RwLock<Option<ConnectionManager>>,
}

impl RedisPool {
    pub fn new(config: &RedisConfig) -> Result<Self, RedisError> {
        let client = Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            manager: RwLock::new(None),
        })
    }

    /// Get a connection, establishing one if none exists yet.
    pub async fn get_connection(&self) -> Result<ConnectionManager, RedisError> {
        {
            let guard = self.manager.read().await;
            if let Some(ref manager) = *guard {
                return Ok(manager.clone());
            }
        }

        let mut guard = self.manager.write().await;
        // Double-check in case another task connected while we waited
        if let Some(ref manager) = *guard {
            return Ok(manager.clone());
        }

        match self.client.get_connection_manager().await {
            Ok(manager) => {
                *guard = Some(manager.clone());
                tracing::info!("Redis connection established");
                Ok(manager)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(e)
            }
        }
    }
}
