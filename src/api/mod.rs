//! Health and statistics endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::fanout::FanoutStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub registry: RegistryHealthResponse,
    pub transport: TransportHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct RegistryHealthResponse {
    pub backend: String,
    pub default_room: String,
}

#[derive(Debug, Serialize)]
pub struct TransportHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub fanout: FanoutStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        registry: RegistryHealthResponse {
            backend: state.registry.backend_type().as_str().to_string(),
            default_room: state.settings.registry.default_room.clone(),
        },
        transport: TransportHealthResponse {
            backend: state.transport.backend_type().as_str().to_string(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        fanout: state.broadcaster.stats(),
    })
}

pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong" }))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/ping", get(ping))
        .route("/api/v1/stats", get(stats))
}
