use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One registered push-capable connection.
///
/// A connection id maps to at most one record at any instant, and a record
/// names exactly one room. `expires_at` is the safety net for missed
/// disconnect events: once it elapses the entry may be reclaimed without an
/// explicit deregistration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub connection_id: String,
    pub room_id: String,
    pub expires_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(
        connection_id: impl Into<String>,
        room_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            room_id: room_id.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry() {
        let live = ConnectionRecord::new("c1", "lobby", Utc::now() + Duration::hours(1));
        assert!(!live.is_expired());

        let expired = ConnectionRecord::new("c2", "lobby", Utc::now() - Duration::seconds(5));
        assert!(expired.is_expired());
    }

    #[test]
    fn test_record_serialization() {
        let record = ConnectionRecord::new("conn-1", "lobby", Utc::now() + Duration::hours(24));
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ConnectionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
