//! GET /api/health: liveness/readiness probe.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use std::time::Instant;

use crate::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let start = Instant::now();
    let db = state.persistence.ping().await;
    let response_time = start.elapsed().as_millis();

    match db {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": Utc::now().to_rfc3339(),
                "responseTime": format!("{response_time}ms"),
                "services": {
                    "database": "connected",
                    "openai": if state.settings.api_key.is_some() { "configured" } else { "missing" },
                },
                "environment": {
                    "model": state.settings.model,
                    "mock": state.settings.mock,
                },
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "timestamp": Utc::now().to_rfc3339(),
                "responseTime": format!("{response_time}ms"),
                "error": e.to_string(),
                "services": {
                    "database": "disconnected",
                },
            })),
        ),
    }
}
