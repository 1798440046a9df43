//! Bible counseling chat backend.
//!
//! Pairs a user's personal concern with relevant bible verse excerpts and
//! LLM-generated counseling responses across a multi-step dialogue flow
//! (initial → exploration → analysis → followup).
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP API (`/api/chat`, `/api/history`,
//!   `/api/health`, `/api/metrics`)
//! - **Counseling**: 4-state per-session flow orchestrating verse search and
//!   LLM calls
//! - **Verses**: linear cosine-similarity search over precomputed embeddings
//! - **Resilience**: sliding-window rate limiter, retry with backoff, circuit
//!   breaker around outbound calls
//! - **Persistence**: pluggable store (Postgres via sqlx, or in-memory)

pub mod api;
pub mod config;
pub mod counseling;
pub mod llm;
pub mod persistence;
pub mod resilience;
pub mod server;
pub mod telemetry;
pub mod verses;

use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppConfig, LlmSettings};
use crate::counseling::CounselingService;
use crate::persistence::PersistenceLayer;
use crate::resilience::RateLimiter;

/// Application state shared across all handlers.
///
/// Process-wide mutable state (rate-limit buckets, breaker state) lives in
/// explicitly constructed objects here rather than globals, so tests can
/// build isolated instances.
#[derive(Clone)]
pub struct AppState {
    /// Counseling state machine.
    pub counseling: Arc<CounselingService>,
    /// Storage boundary.
    pub persistence: Arc<dyn PersistenceLayer>,
    /// Per-client-key request limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// LLM connection settings.
    pub settings: LlmSettings,
    /// Global configuration.
    pub config: Arc<AppConfig>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .finish()
    }
}
