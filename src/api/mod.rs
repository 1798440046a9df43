//! HTTP API: request handlers and the error-to-status mapping.

pub mod chat;
pub mod health;
pub mod history;
pub mod metrics;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use thiserror::Error;

use crate::AppState;
use crate::counseling::CounselError;

/// API routes, nested under `/api` by the server.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat_handler))
        .route("/history", get(history::history_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
}

/// Error taxonomy surfaced over HTTP. No structured codes beyond the status
/// and a free-text message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or parameters → 400, surfaced verbatim.
    #[error("{0}")]
    Validation(String),

    /// Too many requests → 429 with a machine-readable cooldown hint.
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// Missing credentials or similar deployment faults → 500, non-retryable.
    #[error("server misconfigured: {0}")]
    Config(String),

    /// LLM/embedding failure after local retries and breaker → 502.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Anything else, database write failures included → generic 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CounselError> for ApiError {
    fn from(e: CounselError) -> Self {
        match e {
            CounselError::Upstream(inner) => Self::Upstream(inner.to_string()),
            CounselError::CircuitOpen => Self::Upstream("circuit open".to_string()),
            CounselError::Storage(inner) => Self::Internal(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, None),
            Self::RateLimited { retry_after_secs } => {
                (StatusCode::TOO_MANY_REQUESTS, Some(*retry_after_secs))
            }
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, None),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        }

        let mut headers = HeaderMap::new();
        let body = if let Some(secs) = retry_after {
            if let Ok(v) = secs.to_string().parse() {
                headers.insert(axum::http::header::RETRY_AFTER, v);
            }
            json!({ "message": self.to_string(), "retryAfterSeconds": secs })
        } else {
            json!({ "message": self.to_string() })
        };

        (status, headers, Json(body)).into_response()
    }
}
