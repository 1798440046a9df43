//! Storage boundary for sessions, chat turns, counseling state, and verses.
//!
//! [`PersistenceLayer`] is implemented by [`providers::postgres::PostgresProvider`]
//! (sqlx + pgvector) and [`providers::memory::MemoryProvider`] (in-process maps
//! for tests and credential-less environments).
//!
//! Read-modify-write sequences are not wrapped in a transaction: a client
//! double-sending for the same session races last-write-wins.

pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::counseling::CounselingState;
use crate::verses::{VerseRecord, VerseRef};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for TurnRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(anyhow::anyhow!("unknown turn role: {other}")),
        }
    }
}

/// One persisted message. Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub session_id: String,
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub verses: Vec<VerseRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prayer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-session metadata, upserted on every message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// History retrieval filter; cursor is the `created_at` of the last item of
/// the previous page.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub session_id: String,
    pub cursor: Option<DateTime<Utc>>,
    pub limit: usize,
    pub substring: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PersistenceLayer: Send + Sync + std::fmt::Debug {
    /// Cheap connectivity probe for health/metrics.
    async fn ping(&self) -> Result<()>;

    // Session metadata
    async fn upsert_session(&self, meta: &SessionMeta) -> Result<()>;

    // Chat turns
    async fn append_turn(&self, turn: &ChatTurn) -> Result<()>;
    async fn list_turns(&self, query: &HistoryQuery) -> Result<HistoryPage>;

    // Counseling state
    async fn load_counseling(&self, session_id: &str) -> Result<Option<CounselingState>>;
    async fn save_counseling(&self, state: &CounselingState) -> Result<()>;
    /// Retention sweep; returns the number of deleted sessions.
    async fn delete_counseling_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    // Verse store
    async fn upsert_verse(&self, verse: &VerseRecord) -> Result<()>;
    /// Verses that carry an embedding, capped at `limit` for scan cost.
    async fn load_embedded_verses(&self, limit: usize) -> Result<Vec<VerseRecord>>;
    /// Verses still awaiting an embedding (seeder work queue).
    async fn list_unembedded_verses(&self) -> Result<Vec<VerseRecord>>;
    async fn clear_verses(&self) -> Result<u64>;
}
