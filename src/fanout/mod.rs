//! Fan-out broadcast engine: membership resolution, per-member delivery,
//! outcome classification and registry pruning.

mod broadcaster;
mod types;

pub use broadcaster::{FanoutBroadcaster, FanoutError};
pub use types::{
    BroadcastRequest, BroadcastSummary, DeliveryOutcome, FanoutStats, FanoutStatsSnapshot,
    OutboundMessage,
};
