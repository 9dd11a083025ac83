use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{PushTransport, TransportBackend, TransportError};

/// In-process push transport.
///
/// Each attached connection owns an mpsc receiver; delivery pushes the
/// payload into its buffer without blocking. A missing or closed route means
/// the connection no longer exists at the transport layer, a full buffer is
/// a transient throttle.
pub struct ChannelPushTransport {
    /// connection_id -> payload sender
    routes: DashMap<String, mpsc::Sender<Vec<u8>>>,
    capacity: usize,
}

impl ChannelPushTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            routes: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Attach a connection and hand back its payload stream.
    /// Re-attaching the same id replaces the previous route.
    pub fn attach(&self, connection_id: &str) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.routes.insert(connection_id.to_string(), tx);
        rx
    }

    /// Drop a connection's route; subsequent sends report the recipient gone.
    pub fn detach(&self, connection_id: &str) {
        self.routes.remove(connection_id);
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[async_trait]
impl PushTransport for ChannelPushTransport {
    fn backend_type(&self) -> TransportBackend {
        TransportBackend::Channel
    }

    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), TransportError> {
        let Some(route) = self.routes.get(connection_id) else {
            return Err(TransportError::RecipientGone(connection_id.to_string()));
        };

        match route.try_send(payload.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Throttled),
            Err(TrySendError::Closed(_)) => {
                drop(route);
                self.routes.remove(connection_id);
                Err(TransportError::RecipientGone(connection_id.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_unknown_connection_is_gone() {
        let transport = ChannelPushTransport::new(8);
        let err = transport.send("nope", b"hello").await.unwrap_err();
        assert!(err.is_recipient_gone());
    }

    #[tokio::test]
    async fn test_send_delivers_payload() {
        let transport = ChannelPushTransport::new(8);
        let mut rx = transport.attach("c1");

        transport.send("c1", b"hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_is_gone() {
        let transport = ChannelPushTransport::new(8);
        let rx = transport.attach("c1");
        drop(rx);

        let err = transport.send("c1", b"hello").await.unwrap_err();
        assert!(err.is_recipient_gone());
        // Route is cleaned up on first failure
        assert_eq!(transport.route_count(), 0);
    }

    #[tokio::test]
    async fn test_full_buffer_is_throttled() {
        let transport = ChannelPushTransport::new(1);
        let _rx = transport.attach("c1");

        transport.send("c1", b"one").await.unwrap();
        let err = transport.send("c1", b"two").await.unwrap_err();
        assert!(matches!(err, TransportError::Throttled));
    }

    #[tokio::test]
    async fn test_detach_makes_recipient_gone() {
        let transport = ChannelPushTransport::new(8);
        let _rx = transport.attach("c1");
        transport.detach("c1");

        let err = transport.send("c1", b"hello").await.unwrap_err();
        assert!(err.is_recipient_gone());
    }
}
