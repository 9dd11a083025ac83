use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ConnectionRecord, ConnectionRegistry, RegistryBackend, RegistryError};

/// In-process registry backend.
///
/// Suitable for single-node deployments and tests. Expired entries are
/// filtered out of query results immediately and physically removed by the
/// expiry sweeper task.
pub struct MemoryConnectionRegistry {
    /// connection_id -> record
    connections: DashMap<String, ConnectionRecord>,
    /// room_id -> member connection ids
    rooms: DashMap<String, HashSet<String>>,
}

impl MemoryConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    fn remove_from_room(&self, room_id: &str, connection_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(connection_id);
            let empty = members.is_empty();
            drop(members);
            if empty {
                self.rooms.remove_if(room_id, |_, m| m.is_empty());
            }
        }
    }
}

impl Default for MemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryConnectionRegistry {
    fn backend_type(&self) -> RegistryBackend {
        RegistryBackend::Memory
    }

    async fn put(&self, record: &ConnectionRecord) -> Result<(), RegistryError> {
        let previous = self
            .connections
            .insert(record.connection_id.clone(), record.clone());

        // Keep the room index consistent when a re-register moved rooms
        if let Some(prev) = previous {
            if prev.room_id != record.room_id {
                self.remove_from_room(&prev.room_id, &record.connection_id);
            }
        }

        self.rooms
            .entry(record.room_id.clone())
            .or_default()
            .insert(record.connection_id.clone());

        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError> {
        if let Some((_, record)) = self.connections.remove(connection_id) {
            self.remove_from_room(&record.room_id, connection_id);
        }
        Ok(())
    }

    async fn query_by_room(&self, room_id: &str) -> Result<Vec<ConnectionRecord>, RegistryError> {
        let member_ids: Vec<String> = match self.rooms.get(room_id) {
            Some(members) => members.iter().cloned().collect(),
            None => return Ok(Vec::new()),
        };

        let mut live = Vec::with_capacity(member_ids.len());
        let mut stale = Vec::new();

        for id in member_ids {
            let record = self.connections.get(&id).map(|r| r.clone());
            match record {
                Some(r) if r.room_id == room_id && !r.is_expired() => live.push(r),
                Some(r) if r.is_expired() => {
                    self.connections.remove_if(&id, |_, c| c.is_expired());
                    stale.push(id);
                }
                // Moved rooms, or deleted since the index was read
                _ => stale.push(id),
            }
        }

        for id in &stale {
            self.remove_from_room(room_id, id);
        }

        Ok(live)
    }

    async fn purge_expired(&self) -> Result<usize, RegistryError> {
        let expired: Vec<(String, String)> = self
            .connections
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| (entry.key().clone(), entry.value().room_id.clone()))
            .collect();

        let mut removed = 0;
        for (id, room_id) in expired {
            if self
                .connections
                .remove_if(&id, |_, record| record.is_expired())
                .is_some()
            {
                self.remove_from_room(&room_id, &id);
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str, room: &str) -> ConnectionRecord {
        ConnectionRecord::new(id, room, Utc::now() + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let registry = MemoryConnectionRegistry::new();

        registry.put(&record("c1", "lobby")).await.unwrap();
        registry.put(&record("c1", "lobby")).await.unwrap();

        let members = registry.query_by_room("lobby").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].connection_id, "c1");
    }

    #[tokio::test]
    async fn test_reregister_moves_rooms() {
        let registry = MemoryConnectionRegistry::new();

        registry.put(&record("c1", "lobby")).await.unwrap();
        registry.put(&record("c1", "ops")).await.unwrap();

        assert!(registry.query_by_room("lobby").await.unwrap().is_empty());
        let ops = registry.query_by_room("ops").await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].room_id, "ops");
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let registry = MemoryConnectionRegistry::new();
        assert!(registry.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_filters_expired() {
        let registry = MemoryConnectionRegistry::new();

        registry.put(&record("live", "lobby")).await.unwrap();
        registry
            .put(&ConnectionRecord::new(
                "dead",
                "lobby",
                Utc::now() - Duration::seconds(5),
            ))
            .await
            .unwrap();

        let members = registry.query_by_room("lobby").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].connection_id, "live");
    }

    #[tokio::test]
    async fn test_query_results_match_room() {
        let registry = MemoryConnectionRegistry::new();

        registry.put(&record("a", "lobby")).await.unwrap();
        registry.put(&record("b", "ops")).await.unwrap();

        for member in registry.query_by_room("lobby").await.unwrap() {
            assert_eq!(member.room_id, "lobby");
        }
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let registry = MemoryConnectionRegistry::new();

        registry.put(&record("live", "lobby")).await.unwrap();
        registry
            .put(&ConnectionRecord::new(
                "dead",
                "lobby",
                Utc::now() - Duration::seconds(5),
            ))
            .await
            .unwrap();

        let removed = registry.purge_expired().await.unwrap();
        assert_eq!(removed, 1);

        let members = registry.query_by_room("lobby").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].connection_id, "live");
    }
}
