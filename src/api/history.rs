//! GET /api/history: paginated chat turn retrieval.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::AppState;
use crate::persistence::{HistoryPage, HistoryQuery};

use super::ApiError;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    #[serde(default)]
    pub session_id: Option<String>,
    /// RFC3339 `created_at` of the last item of the previous page.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Case-insensitive content substring filter.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

fn parse_date(field: &str, value: Option<&String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| ApiError::Validation(format!("{field} must be an RFC3339 datetime")))
        })
        .transpose()
}

pub async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let session_id = params
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("sessionId is required".to_string()))?
        .to_string();

    let limit = params
        .limit
        .filter(|l| *l > 0 && *l <= MAX_LIMIT)
        .unwrap_or(DEFAULT_LIMIT);

    let query = HistoryQuery {
        session_id,
        cursor: parse_date("cursor", params.cursor.as_ref())?,
        limit,
        substring: params.q.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(ToString::to_string),
        from: parse_date("from", params.from.as_ref())?,
        to: parse_date("to", params.to.as_ref())?,
    };

    let page = state.persistence.list_turns(&query).await?;
    Ok(Json(page))
}
