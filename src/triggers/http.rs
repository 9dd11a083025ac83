//! Inbound event surface.
//!
//! The external event source invokes one of three operations per session
//! event: connect, disconnect, send. The session's connection id is bound
//! into the `x-connection-id` header by the invoking gateway.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::fanout::BroadcastRequest;
use crate::server::AppState;

/// Header carrying the session's connection id
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";
/// Optional header selecting the room on connect
pub const ROOM_ID_HEADER: &str = "x-room-id";

/// Body of a send event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default, rename = "roomId")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "userId")]
    pub user_id: String,
}

fn connection_id(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(CONNECTION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("missing {} header", CONNECTION_ID_HEADER)))
}

#[tracing::instrument(name = "trigger.connect", skip(state, headers))]
pub async fn connect(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    let connection_id = connection_id(&headers)?;
    let room_id = headers.get(ROOM_ID_HEADER).and_then(|value| value.to_str().ok());

    state.membership.register(connection_id, room_id).await?;

    Ok(StatusCode::OK)
}

#[tracing::instrument(name = "trigger.disconnect", skip(state, headers))]
pub async fn disconnect(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    let connection_id = connection_id(&headers)?;

    state.membership.deregister(connection_id).await?;

    Ok(StatusCode::OK)
}

#[tracing::instrument(name = "trigger.send", skip(state, body))]
pub async fn send(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str)> {
    // A malformed body is treated as empty, never a hard failure
    let request: SendRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Malformed send body, using defaults");
        SendRequest::default()
    });

    let summary = state
        .broadcaster
        .broadcast(BroadcastRequest {
            room_id: request.room_id,
            sender_id: request.user_id,
            text: request.text,
        })
        .await?;

    tracing::debug!(
        broadcast_id = %summary.broadcast_id,
        action = %request.action,
        room_id = %summary.room_id,
        delivered = summary.delivered,
        pruned = summary.pruned,
        failed = summary.failed,
        "Send processed"
    );

    Ok((StatusCode::OK, "ok"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use axum::http::HeaderValue;

    fn test_state() -> AppState {
        AppState::new(Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_connect_requires_connection_id() {
        let state = test_state();
        let result = connect(State(state), HeaderMap::new()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_connect_then_disconnect() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION_ID_HEADER, HeaderValue::from_static("c1"));

        let status = connect(State(state.clone()), headers.clone()).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.registry.query_by_room("lobby").await.unwrap().len(), 1);

        let status = disconnect(State(state.clone()), headers).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(state.registry.query_by_room("lobby").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_tolerates_malformed_body() {
        let state = test_state();
        let (status, body) = send(State(state), Bytes::from_static(b"{not json"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
