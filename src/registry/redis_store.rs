use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::redis::RedisPool;

use super::{ConnectionRecord, ConnectionRegistry, RegistryBackend, RegistryError};

/// Redis-backed durable registry.
///
/// Layout: one JSON record per connection under `{prefix}:conn:{id}` with an
/// `EX` TTL (passive expiry happens storage-side), plus a `{prefix}:room:{id}`
/// set as the room index. Dangling index members are dropped opportunistically
/// during queries, so a missed delete converges without a sweeper.
pub struct RedisConnectionRegistry {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisConnectionRegistry {
    pub fn new(pool: Arc<RedisPool>, prefix: String) -> Self {
        Self { pool, prefix }
    }

    fn conn_key(&self, connection_id: &str) -> String {
        format!("{}:conn:{}", self.prefix, connection_id)
    }

    fn room_key(&self, room_id: &str) -> String {
        format!("{}:room:{}", self.prefix, room_id)
    }

    async fn connection(&self) -> Result<ConnectionManager, RegistryError> {
        self.pool
            .get_connection()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ConnectionRegistry for RedisConnectionRegistry {
    fn backend_type(&self) -> RegistryBackend {
        RegistryBackend::Redis
    }

    async fn put(&self, record: &ConnectionRecord) -> Result<(), RegistryError> {
        let mut conn = self.connection().await?;

        let json = serde_json::to_string(record)
            .map_err(|e| RegistryError::Serialization(e.to_string()))?;
        let ttl = (record.expires_at - Utc::now()).num_seconds().max(1);

        // A re-register may have moved rooms; drop the old index entry first
        let previous: Option<String> = conn
            .get(&self.conn_key(&record.connection_id))
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        if let Some(prev_json) = previous {
            if let Ok(prev) = serde_json::from_str::<ConnectionRecord>(&prev_json) {
                if prev.room_id != record.room_id {
                    let _: () = conn
                        .srem(&self.room_key(&prev.room_id), &record.connection_id)
                        .await
                        .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
                }
            }
        }

        let room_key = self.room_key(&record.room_id);
        let _: () = redis::pipe()
            // Store the record with passive expiry
            .cmd("SET")
            .arg(&self.conn_key(&record.connection_id))
            .arg(&json)
            .arg("EX")
            .arg(ttl)
            // Add to the room index
            .cmd("SADD")
            .arg(&room_key)
            .arg(&record.connection_id)
            // Index lives at least as long as its newest member
            .cmd("EXPIRE")
            .arg(&room_key)
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError> {
        let mut conn = self.connection().await?;

        let conn_key = self.conn_key(connection_id);
        let json: Option<String> = conn
            .get(&conn_key)
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        let Some(json) = json else {
            // Already gone; deleting a missing id is a no-op success
            return Ok(());
        };

        match serde_json::from_str::<ConnectionRecord>(&json) {
            Ok(record) => {
                let _: () = redis::pipe()
                    .cmd("DEL")
                    .arg(&conn_key)
                    .cmd("SREM")
                    .arg(&self.room_key(&record.room_id))
                    .arg(connection_id)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
            }
            Err(e) => {
                // Unreadable record: delete the key, the index entry will be
                // dropped by the next query
                tracing::warn!(connection_id = %connection_id, error = %e, "Deleting unreadable registry record");
                let _: () = conn
                    .del(&conn_key)
                    .await
                    .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
            }
        }

        Ok(())
    }

    async fn query_by_room(&self, room_id: &str) -> Result<Vec<ConnectionRecord>, RegistryError> {
        let mut conn = self.connection().await?;

        let room_key = self.room_key(room_id);
        let member_ids: Vec<String> = conn
            .smembers(&room_key)
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn_keys: Vec<String> = member_ids.iter().map(|id| self.conn_key(id)).collect();
        let raw: Vec<Option<String>> = conn
            .mget(&conn_keys)
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        let mut live = Vec::with_capacity(member_ids.len());
        let mut stale = Vec::new();

        for (id, value) in member_ids.into_iter().zip(raw) {
            match value.as_deref().map(serde_json::from_str::<ConnectionRecord>) {
                Some(Ok(record)) if record.room_id == room_id => live.push(record),
                // Moved rooms since the index entry was written
                Some(Ok(_)) => stale.push(id),
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %id, error = %e, "Dropping unreadable registry record from index");
                    stale.push(id);
                }
                // Record expired or deleted while still indexed
                None => stale.push(id),
            }
        }

        if !stale.is_empty() {
            // Housekeeping only; the query result is already correct
            if let Err(e) = conn.srem::<_, _, ()>(&room_key, &stale).await {
                tracing::warn!(room_id = %room_id, error = %e, "Failed to drop stale index members");
            } else {
                tracing::debug!(room_id = %room_id, dropped = stale.len(), "Dropped stale index members");
            }
        }

        Ok(live)
    }

    async fn purge_expired(&self) -> Result<usize, RegistryError> {
        // Redis reclaims expired records via key TTLs; nothing to do here
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[test]
    fn test_key_layout() {
        let pool = Arc::new(RedisPool::new(&RedisConfig::default()).unwrap());
        let registry = RedisConnectionRegistry::new(pool, "roomcast:registry".to_string());

        assert_eq!(registry.conn_key("abc"), "roomcast:registry:conn:abc");
        assert_eq!(registry.room_key("lobby"), "roomcast:registry:room:lobby");
    }
}
