//! GET /api/metrics: process uptime/memory snapshot.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use std::time::Instant;

use crate::AppState;

/// Resident set size in MB, read from procfs. `None` off Linux or when the
/// read fails.
fn rss_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}

pub async fn metrics_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let start = Instant::now();
    let db = state.persistence.ping().await;
    let db_response_time = start.elapsed().as_millis();

    let uptime = state.started_at.elapsed().as_secs();

    match db {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "timestamp": Utc::now().to_rfc3339(),
                "uptime": format!("{uptime}s"),
                "memory": {
                    "rss": rss_mb().map_or_else(|| "unknown".to_string(), |mb| format!("{mb}MB")),
                },
                "database": {
                    "responseTime": format!("{db_response_time}ms"),
                    "status": "connected",
                },
                "environment": {
                    "platform": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "timestamp": Utc::now().to_rfc3339(),
                "error": e.to_string(),
                "status": "error",
            })),
        ),
    }
}
