use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::FanoutConfig;
use crate::registry::{ConnectionRecord, ConnectionRegistry};
use crate::transport::{PushTransport, TransportError};

use super::types::{
    BroadcastRequest, BroadcastSummary, DeliveryOutcome, FanoutStats, FanoutStatsSnapshot,
    OutboundMessage,
};

#[derive(Debug, Error)]
pub enum FanoutError {
    /// Membership resolution failed; no members can be known, so nothing
    /// was attempted
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error("failed to encode outbound payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivers one message to every current member of a room and converges the
/// registry toward removing members that can no longer receive delivery.
pub struct FanoutBroadcaster {
    registry: Arc<dyn ConnectionRegistry>,
    transport: Arc<dyn PushTransport>,
    config: FanoutConfig,
    default_room: String,
    stats: FanoutStats,
}

impl FanoutBroadcaster {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        transport: Arc<dyn PushTransport>,
        config: FanoutConfig,
        default_room: String,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
            default_room,
            stats: FanoutStats::default(),
        }
    }

    /// Get fan-out statistics
    pub fn stats(&self) -> FanoutStatsSnapshot {
        self.stats.snapshot()
    }

    /// Fan one message out to every member of the target room.
    ///
    /// Individual delivery failures never fail the broadcast; only a failed
    /// membership resolution (or payload encoding) does. Members whose
    /// delivery is confirmed gone are pruned from the registry best-effort.
    pub async fn broadcast(
        &self,
        request: BroadcastRequest,
    ) -> Result<BroadcastSummary, FanoutError> {
        let broadcast_id = Uuid::new_v4();
        let room_id = request
            .room_id
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_room)
            .to_string();

        let members = self.registry.query_by_room(&room_id).await?;

        tracing::debug!(
            broadcast_id = %broadcast_id,
            room_id = %room_id,
            members = members.len(),
            "Resolved room membership"
        );

        // Serialize once; every member receives identical bytes
        let payload: Arc<[u8]> = serde_json::to_vec(&OutboundMessage::Message {
            room_id: room_id.clone(),
            user_id: request.sender_id.clone(),
            text: request.text.clone(),
        })?
        .into();

        let total = members.len();
        let mut delivered = 0usize;
        let mut pruned = 0usize;
        let mut failed = 0usize;

        // Deliveries are independent; run them concurrently with a cap so a
        // large room cannot exhaust the worker
        let mut in_flight = FuturesUnordered::new();
        for member in &members {
            in_flight.push(self.deliver(broadcast_id, member, payload.clone()));

            while in_flight.len() >= self.config.max_concurrent_sends {
                match in_flight.next().await {
                    Some(DeliveryOutcome::Delivered) => delivered += 1,
                    Some(DeliveryOutcome::ConfirmedGone) => pruned += 1,
                    Some(DeliveryOutcome::TransientError) => failed += 1,
                    None => break,
                }
            }
        }
        while let Some(outcome) = in_flight.next().await {
            match outcome {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::ConfirmedGone => pruned += 1,
                DeliveryOutcome::TransientError => failed += 1,
            }
        }

        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.stats
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats.pruned.fetch_add(pruned as u64, Ordering::Relaxed);
        self.stats
            .transient_failures
            .fetch_add(failed as u64, Ordering::Relaxed);

        tracing::debug!(
            broadcast_id = %broadcast_id,
            room_id = %room_id,
            members = total,
            delivered = delivered,
            pruned = pruned,
            failed = failed,
            "Broadcast completed"
        );

        Ok(BroadcastSummary {
            broadcast_id,
            room_id,
            members: total,
            delivered,
            pruned,
            failed,
        })
    }

    /// Deliver to one member and classify the outcome; confirmed-gone members
    /// are pruned here so the whole attempt stays per-member.
    async fn deliver(
        &self,
        broadcast_id: Uuid,
        member: &ConnectionRecord,
        payload: Arc<[u8]>,
    ) -> DeliveryOutcome {
        let send = self.transport.send(&member.connection_id, &payload);
        let outcome = match timeout(self.config.send_timeout(), send).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(TransportError::RecipientGone(_))) => DeliveryOutcome::ConfirmedGone,
            Ok(Err(e)) => {
                tracing::warn!(
                    broadcast_id = %broadcast_id,
                    connection_id = %member.connection_id,
                    error = %e,
                    "Delivery failed, member retained"
                );
                DeliveryOutcome::TransientError
            }
            // A timed-out delivery is transient, never confirmed gone
            Err(_) => {
                tracing::warn!(
                    broadcast_id = %broadcast_id,
                    connection_id = %member.connection_id,
                    timeout_ms = self.config.send_timeout_ms,
                    "Delivery timed out, member retained"
                );
                DeliveryOutcome::TransientError
            }
        };

        if outcome == DeliveryOutcome::ConfirmedGone {
            tracing::info!(
                broadcast_id = %broadcast_id,
                connection_id = %member.connection_id,
                "Recipient gone, pruning registry entry"
            );
            // Best-effort; passive expiry backstops a failed delete
            if let Err(e) = self.registry.delete(&member.connection_id).await {
                tracing::warn!(
                    connection_id = %member.connection_id,
                    error = %e,
                    "Failed to prune gone connection"
                );
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryConnectionRegistry;
    use crate::transport::ChannelPushTransport;
    use chrono::{Duration, Utc};

    fn broadcaster() -> (
        Arc<MemoryConnectionRegistry>,
        Arc<ChannelPushTransport>,
        FanoutBroadcaster,
    ) {
        let registry = Arc::new(MemoryConnectionRegistry::new());
        let transport = Arc::new(ChannelPushTransport::new(8));
        let broadcaster = FanoutBroadcaster::new(
            registry.clone(),
            transport.clone(),
            FanoutConfig::default(),
            "lobby".to_string(),
        );
        (registry, transport, broadcaster)
    }

    async fn register(registry: &MemoryConnectionRegistry, id: &str, room: &str) {
        registry
            .put(&ConnectionRecord::new(
                id,
                room,
                Utc::now() + Duration::hours(1),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room() {
        let (_, _, broadcaster) = broadcaster();

        let summary = broadcaster
            .broadcast(BroadcastRequest {
                room_id: Some("empty".to_string()),
                sender_id: "u1".to_string(),
                text: "hi".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(summary.members, 0);
        assert_eq!(summary.delivered, 0);
    }

    #[tokio::test]
    async fn test_missing_room_uses_default() {
        let (registry, transport, broadcaster) = broadcaster();
        register(&registry, "c1", "lobby").await;
        let mut rx = transport.attach("c1");

        let summary = broadcaster
            .broadcast(BroadcastRequest {
                room_id: None,
                sender_id: "u1".to_string(),
                text: "hi".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(summary.room_id, "lobby");
        assert_eq!(summary.delivered, 1);

        let payload = rx.recv().await.unwrap();
        let message: OutboundMessage = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            message,
            OutboundMessage::Message {
                room_id: "lobby".to_string(),
                user_id: "u1".to_string(),
                text: "hi".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let (registry, transport, broadcaster) = broadcaster();
        register(&registry, "c1", "lobby").await;
        let _rx = transport.attach("c1");

        for _ in 0..2 {
            broadcaster
                .broadcast(BroadcastRequest {
                    room_id: None,
                    sender_id: "u1".to_string(),
                    text: "hi".to_string(),
                })
                .await
                .unwrap();
        }

        let stats = broadcaster.stats();
        assert_eq!(stats.broadcasts, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.pruned, 0);
    }
}
