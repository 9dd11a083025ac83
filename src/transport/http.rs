use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{PushTransport, TransportBackend, TransportError};

/// Push transport backed by a gateway management endpoint.
///
/// Delivery is `POST {endpoint}/connections/{id}` with the raw payload as the
/// body. The gateway answers 410 once the addressed connection has closed;
/// that and only that maps to [`TransportError::RecipientGone`].
pub struct GatewayPushTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewayPushTransport {
    pub fn new(endpoint: String, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn connection_url(&self, connection_id: &str) -> String {
        format!("{}/connections/{}", self.endpoint, connection_id)
    }
}

#[async_trait]
impl PushTransport for GatewayPushTransport {
    fn backend_type(&self) -> TransportBackend {
        TransportBackend::Http
    }

    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.connection_url(connection_id))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Fault(e.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::GONE => Err(TransportError::RecipientGone(connection_id.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(TransportError::Throttled),
            status => Err(TransportError::Fault(format!(
                "push endpoint returned {}",
                status
            ))),
        }
    }
}
