//! Push transport: unicast delivery of an opaque payload to one connection.
//!
//! The error taxonomy carries "recipient gone" as a first-class variant so
//! the broadcaster never inspects transport-specific fault shapes: gone means
//! the addressed connection no longer exists at the transport layer, and
//! everything else is a transient fault that must not trigger pruning.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TransportConfig;

mod channel;
mod http;

pub use channel::ChannelPushTransport;
pub use http::GatewayPushTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The addressed connection no longer exists; the only outcome that
    /// justifies pruning the registry
    #[error("recipient {0} is gone")]
    RecipientGone(String),

    /// The delivery attempt timed out; transient
    #[error("delivery timed out")]
    Timeout,

    /// The push endpoint throttled the request; transient
    #[error("push endpoint throttled the request")]
    Throttled,

    /// Any other delivery failure; transient
    #[error("transport fault: {0}")]
    Fault(String),
}

impl TransportError {
    pub fn is_recipient_gone(&self) -> bool {
        matches!(self, Self::RecipientGone(_))
    }
}

/// Backend type for the push transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBackend {
    /// Gateway management endpoint over HTTP
    Http,
    /// In-process channel routes, single-node deployments and tests
    Channel,
}

impl TransportBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Channel => "channel",
        }
    }
}

/// Sends an opaque byte payload to exactly one addressed connection.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Get the backend type
    fn backend_type(&self) -> TransportBackend;

    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportInitError {
    #[error("transport.endpoint is required for the http transport backend")]
    MissingEndpoint,

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Create a push transport based on configuration.
pub fn create_push_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn PushTransport>, TransportInitError> {
    match config.backend.as_str() {
        "http" => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or(TransportInitError::MissingEndpoint)?;
            tracing::info!(backend = "http", endpoint = %endpoint, "Creating gateway push transport");
            Ok(Arc::new(GatewayPushTransport::new(
                endpoint,
                config.request_timeout(),
            )?))
        }
        _ => {
            tracing::info!(backend = "channel", "Creating in-process push transport");
            Ok(Arc::new(ChannelPushTransport::new(config.channel_capacity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_backend_requires_endpoint() {
        let config = TransportConfig {
            backend: "http".to_string(),
            endpoint: None,
            ..Default::default()
        };
        assert!(matches!(
            create_push_transport(&config),
            Err(TransportInitError::MissingEndpoint)
        ));
    }

    #[test]
    fn test_default_backend_is_channel() {
        let transport = create_push_transport(&TransportConfig::default()).unwrap();
        assert_eq!(transport.backend_type(), TransportBackend::Channel);
    }
}
