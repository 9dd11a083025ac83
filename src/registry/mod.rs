//! Durable connection registry.
//!
//! The registry is the single source of truth shared by all workers: a store
//! keyed by connection id with a secondary index by room id. All mutations
//! are idempotent so duplicate lifecycle events are safe, and absence of an
//! entry is authoritative ("not registered" means "do not attempt delivery").

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::redis::RedisPool;

mod memory;
mod redis_store;
mod types;

pub use memory::MemoryConnectionRegistry;
pub use redis_store::RedisConnectionRegistry;
pub use types::ConnectionRecord;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Registry I/O failed; the operation it blocks must surface this
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Stored record could not be encoded or decoded
    #[error("registry serialization error: {0}")]
    Serialization(String),
}

/// Backend type for the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryBackend {
    /// In-process store, single-node deployments and tests
    Memory,
    /// Redis-backed durable store shared by all workers
    Redis,
}

impl RegistryBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

/// Typed access to the durable connection store.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Get the backend type
    fn backend_type(&self) -> RegistryBackend;

    /// Upsert a connection record, replacing any prior entry for the same id
    async fn put(&self, record: &ConnectionRecord) -> Result<(), RegistryError>;

    /// Point delete; deleting a missing id is a no-op success
    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError>;

    /// All live entries whose room id equals `room_id`, unordered
    async fn query_by_room(&self, room_id: &str) -> Result<Vec<ConnectionRecord>, RegistryError>;

    /// Drop entries whose expiry elapsed, returning how many were removed.
    /// Backends whose storage expires entries by itself return 0.
    async fn purge_expired(&self) -> Result<usize, RegistryError>;
}

/// Create a connection registry based on configuration.
///
/// Falls back to the in-memory backend when Redis is requested but no pool
/// is available.
pub fn create_registry(
    config: &RegistryConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn ConnectionRegistry> {
    match config.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %config.key_prefix,
                    "Creating Redis connection registry"
                );
                Arc::new(RedisConnectionRegistry::new(pool, config.key_prefix.clone()))
            } else {
                tracing::warn!(
                    "Redis registry requested but no pool available, falling back to memory"
                );
                Arc::new(MemoryConnectionRegistry::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating in-memory connection registry");
            Arc::new(MemoryConnectionRegistry::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memory_registry() {
        let config = RegistryConfig::default();
        let registry = create_registry(&config, None);
        assert_eq!(registry.backend_type(), RegistryBackend::Memory);
    }

    #[test]
    fn test_redis_without_pool_falls_back_to_memory() {
        let config = RegistryConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };
        let registry = create_registry(&config, None);
        assert_eq!(registry.backend_type(), RegistryBackend::Memory);
    }
}
