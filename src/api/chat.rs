//! POST /api/chat: one counseling turn.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::counseling::{CounselingStep, Progress};
use crate::persistence::{ChatTurn, SessionMeta, TurnRole};
use crate::resilience::RateDecision;
use crate::verses::VerseRef;

use super::ApiError;

const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub content: String,
    pub verses: Vec<VerseRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prayer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mocked: Option<bool>,
    pub counseling_step: CounselingStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_question: Option<String>,
    pub is_question_phase: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

/// Rate-limit key: forwarded client IP, the way the reverse proxy reports it.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    // Rate limit before any work, keyed per client.
    if state.config.resilience.rate_limit_enabled {
        let key = format!("chat:{}", client_ip(&headers));
        if let RateDecision::Limited { retry_after } = state.rate_limiter.check(&key) {
            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
    }

    let Json(req) = body.map_err(|e| ApiError::Validation(format!("invalid request: {e}")))?;

    if req.session_id.trim().is_empty() {
        return Err(ApiError::Validation("sessionId is required".to_string()));
    }
    if req.message.is_empty() || req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "message must be 1..={MAX_MESSAGE_CHARS} characters"
        )));
    }

    if !state.settings.mock && state.settings.api_key.is_none() {
        return Err(ApiError::Config("OPENAI_API_KEY missing".to_string()));
    }

    tracing::info!(session_id = %req.session_id, "chat message received");

    state
        .persistence
        .upsert_session(&SessionMeta {
            session_id: req.session_id.clone(),
            user_agent: req.user_agent.clone(),
            locale: req.locale.clone(),
        })
        .await?;

    state
        .persistence
        .append_turn(&ChatTurn {
            session_id: req.session_id.clone(),
            role: TurnRole::User,
            content: req.message.clone(),
            verses: Vec::new(),
            prayer: None,
            created_at: Utc::now(),
        })
        .await?;

    let outcome = state
        .counseling
        .handle_message(&req.session_id, &req.message)
        .await?;

    state
        .persistence
        .append_turn(&ChatTurn {
            session_id: req.session_id.clone(),
            role: TurnRole::Assistant,
            content: outcome.content.clone(),
            verses: outcome.verses.clone(),
            prayer: outcome.prayer.clone(),
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(ChatResponse {
        content: outcome.content,
        verses: outcome.verses,
        prayer: outcome.prayer,
        mocked: state.settings.mock.then_some(true),
        counseling_step: outcome.step,
        next_question: outcome.next_question,
        is_question_phase: outcome.is_question_phase,
        progress: outcome.progress,
    }))
}
