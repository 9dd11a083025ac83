//! Connection lifecycle: keeps the registry's membership facts consistent
//! with connect and disconnect events.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::registry::{ConnectionRecord, ConnectionRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("connection id must not be empty")]
    EmptyConnectionId,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct MembershipManager {
    registry: Arc<dyn ConnectionRegistry>,
    default_room: String,
    connection_ttl: Duration,
}

impl MembershipManager {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        default_room: String,
        connection_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            default_room,
            connection_ttl,
        }
    }

    /// Register a connection into a room, replacing any prior entry for the
    /// same id. An absent or empty room id lands in the default room.
    pub async fn register(
        &self,
        connection_id: &str,
        room_id: Option<&str>,
    ) -> Result<ConnectionRecord, MembershipError> {
        if connection_id.is_empty() {
            return Err(MembershipError::EmptyConnectionId);
        }

        let room = room_id
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_room);
        let ttl = chrono::Duration::from_std(self.connection_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let record = ConnectionRecord::new(connection_id, room, Utc::now() + ttl);

        self.registry.put(&record).await?;

        tracing::info!(
            connection_id = %record.connection_id,
            room_id = %record.room_id,
            expires_at = %record.expires_at,
            "Connection registered"
        );

        Ok(record)
    }

    /// Remove a connection unconditionally. Removing an unknown id succeeds;
    /// passive expiry backstops a failed disconnect either way.
    pub async fn deregister(&self, connection_id: &str) -> Result<(), MembershipError> {
        self.registry.delete(connection_id).await?;

        tracing::info!(connection_id = %connection_id, "Connection deregistered");

        Ok(())
    }
}
