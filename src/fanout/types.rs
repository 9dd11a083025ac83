use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound send event. Ephemeral; has no identity beyond the invocation.
#[derive(Debug, Clone, Default)]
pub struct BroadcastRequest {
    /// Target room; `None` or empty lands in the configured default room
    pub room_id: Option<String>,
    pub sender_id: String,
    pub text: String,
}

/// Wire payload delivered to every member of a broadcast.
///
/// Serialized once per broadcast; every member receives identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "message")]
    Message {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        text: String,
    },
}

/// Classification of one member's delivery attempt. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Payload handed to the transport successfully
    Delivered,
    /// Transport confirmed the recipient no longer exists; prune
    ConfirmedGone,
    /// Timeout, throttle or any other fault; member stays registered
    TransientError,
}

/// Result of one broadcast invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastSummary {
    pub broadcast_id: Uuid,
    pub room_id: String,
    /// Membership snapshot size at resolution time
    pub members: usize,
    pub delivered: usize,
    /// Confirmed-gone detections; the prune delete itself is best-effort
    pub pruned: usize,
    pub failed: usize,
}

/// Counters for the fan-out engine
#[derive(Debug, Default)]
pub struct FanoutStats {
    pub broadcasts: AtomicU64,
    pub delivered: AtomicU64,
    pub pruned: AtomicU64,
    pub transient_failures: AtomicU64,
}

impl FanoutStats {
    pub fn snapshot(&self) -> FanoutStatsSnapshot {
        FanoutStatsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of fan-out statistics
#[derive(Debug, Clone, Serialize)]
pub struct FanoutStatsSnapshot {
    pub broadcasts: u64,
    pub delivered: u64,
    pub pruned: u64,
    pub transient_failures: u64,
}
