use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::fanout::FanoutError;
use crate::membership::MembershipError;
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Membership error: {0}")]
    Membership(#[from] MembershipError),

    #[error("Fan-out error: {0}")]
    Fanout(#[from] FanoutError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn hide_in_production(log_msg: &str, generic: &str) -> String {
    if is_production() {
        generic.to_string()
    } else {
        log_msg.to_string()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = hide_in_production(&log_msg, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIG_ERROR",
                    client_msg,
                    log_msg,
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Membership(MembershipError::EmptyConnectionId) => {
                let msg = self.to_string();
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), msg)
            }
            AppError::Registry(e) | AppError::Membership(MembershipError::Registry(e)) => {
                let log_msg = e.to_string();
                let client_msg = hide_in_production(&log_msg, "Service temporarily unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "REGISTRY_ERROR",
                    client_msg,
                    log_msg,
                )
            }
            AppError::Fanout(e) => {
                let log_msg = e.to_string();
                let client_msg = hide_in_production(&log_msg, "Service temporarily unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "FANOUT_ERROR",
                    client_msg,
                    log_msg,
                )
            }
            AppError::Internal(e) => {
                let log_msg = e.clone();
                let client_msg = hide_in_production(&log_msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    client_msg,
                    log_msg,
                )
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
