//! Multi-step counseling flow.
//!
//! A per-session 4-state machine: `initial` (no concern captured yet) →
//! `exploration` (collecting answers to a generated question batch) →
//! `analysis` (one composite LLM call once enough answers are in) →
//! `followup` (terminal; every message handled independently).
//!
//! Transitions only ever move forward. Concurrent requests for the same
//! session race last-write-wins; there is no per-session lock.

pub mod extract;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::CounselingConfig;
use crate::llm::{LlmClient, LlmError, prompts};
use crate::persistence::PersistenceLayer;
use crate::resilience::{BreakerError, CircuitBreaker, retry_with_backoff};
use crate::verses::{VerseRef, VerseSearcher};

/// Counseling flow step. Ordering is the transition order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CounselingStep {
    Initial,
    Exploration,
    Analysis,
    Followup,
}

impl CounselingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Exploration => "exploration",
            Self::Analysis => "analysis",
            Self::Followup => "followup",
        }
    }
}

impl std::str::FromStr for CounselingStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initial" => Ok(Self::Initial),
            "exploration" => Ok(Self::Exploration),
            "analysis" => Ok(Self::Analysis),
            "followup" => Ok(Self::Followup),
            other => Err(anyhow::anyhow!("unknown counseling step: {other}")),
        }
    }
}

/// Mutable per-session counseling record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingState {
    pub session_id: String,
    pub step: CounselingStep,
    pub initial_concern: Option<String>,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub current_question_index: usize,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CounselingState {
    pub fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            step: CounselingStep::Initial,
            initial_concern: None,
            questions: Vec::new(),
            answers: Vec::new(),
            current_question_index: 0,
            is_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next` if it is ahead of the current step; regressions are
    /// ignored so the step never moves backward.
    pub fn advance(&mut self, next: CounselingStep) {
        if next > self.step {
            self.step = next;
        }
        self.updated_at = Utc::now();
    }
}

/// Exploration progress reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// What the state machine produced for one inbound message.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub verses: Vec<VerseRef>,
    pub prayer: Option<String>,
    pub step: CounselingStep,
    pub next_question: Option<String>,
    pub is_question_phase: bool,
    pub progress: Option<Progress>,
}

#[derive(Debug, Error)]
pub enum CounselError {
    /// Upstream LLM/embedding failure after retries were exhausted.
    #[error("upstream model error: {0}")]
    Upstream(#[from] LlmError),

    /// The circuit breaker is open; no call was attempted.
    #[error("upstream circuit open")]
    CircuitOpen,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<BreakerError<LlmError>> for CounselError {
    fn from(e: BreakerError<LlmError>) -> Self {
        match e {
            BreakerError::Open => Self::CircuitOpen,
            BreakerError::Inner(inner) => Self::Upstream(inner),
        }
    }
}

/// Orchestrates the counseling flow for one inbound message.
#[derive(Debug, Clone)]
pub struct CounselingService {
    llm: Arc<dyn LlmClient>,
    persistence: Arc<dyn PersistenceLayer>,
    searcher: VerseSearcher,
    breaker: Arc<CircuitBreaker>,
    cfg: CounselingConfig,
    retry_attempts: usize,
    retry_base: std::time::Duration,
}

impl CounselingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        persistence: Arc<dyn PersistenceLayer>,
        searcher: VerseSearcher,
        breaker: Arc<CircuitBreaker>,
        cfg: CounselingConfig,
        retry_attempts: usize,
        retry_base: std::time::Duration,
    ) -> Self {
        Self {
            llm,
            persistence,
            searcher,
            breaker,
            cfg,
            retry_attempts,
            retry_base,
        }
    }

    /// Dispatch one message to the step handler for its session.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<ChatOutcome, CounselError> {
        let state = self
            .persistence
            .load_counseling(session_id)
            .await?
            .unwrap_or_else(|| CounselingState::new(session_id));

        match state.step {
            CounselingStep::Initial => self.handle_initial(state, message).await,
            CounselingStep::Exploration => self.handle_exploration(state, message).await,
            CounselingStep::Analysis | CounselingStep::Followup => {
                self.handle_followup(state, message).await
            }
        }
    }

    async fn handle_initial(
        &self,
        mut state: CounselingState,
        concern: &str,
    ) -> Result<ChatOutcome, CounselError> {
        let count = self.cfg.question_count;
        let questions = self
            .breaker
            .call(|| {
                retry_with_backoff(self.retry_attempts, self.retry_base, || {
                    self.llm.generate_questions(concern, count)
                })
            })
            .await?;

        info!(
            session_id = %state.session_id,
            questions = questions.len(),
            "exploration questions generated"
        );

        let Some(first) = questions.first().cloned() else {
            return Err(CounselError::Upstream(LlmError::EmptyResponse));
        };

        state.initial_concern = Some(concern.to_string());
        state.questions = questions.clone();
        state.current_question_index = 0;
        state.advance(CounselingStep::Exploration);
        self.persistence.save_counseling(&state).await?;

        let total = questions.len();
        let mut content = String::from(
            "고민을 나눠주셔서 감사합니다. 더 깊이 이해할 수 있도록 몇 가지 여쭤볼게요.\n\n",
        );
        content.push_str(&first);

        Ok(ChatOutcome {
            content,
            verses: Vec::new(),
            prayer: None,
            step: CounselingStep::Exploration,
            next_question: Some(first),
            is_question_phase: true,
            progress: Some(Progress { current: 0, total }),
        })
    }

    async fn handle_exploration(
        &self,
        mut state: CounselingState,
        answer: &str,
    ) -> Result<ChatOutcome, CounselError> {
        state.answers.push(answer.to_string());
        state.current_question_index =
            (state.current_question_index + 1).min(state.questions.len());

        let threshold = self.cfg.analysis_threshold.min(state.questions.len());
        if state.answers.len() < threshold {
            let next = state.questions[state.current_question_index.min(state.questions.len() - 1)]
                .clone();
            let progress = Progress {
                current: state.answers.len(),
                total: state.questions.len(),
            };
            state.advance(CounselingStep::Exploration);
            self.persistence.save_counseling(&state).await?;

            return Ok(ChatOutcome {
                content: next.clone(),
                verses: Vec::new(),
                prayer: None,
                step: CounselingStep::Exploration,
                next_question: Some(next),
                is_question_phase: true,
                progress: Some(progress),
            });
        }

        // Enough answers: one composite analysis pass.
        state.advance(CounselingStep::Analysis);

        let concern = state.initial_concern.clone().unwrap_or_default();
        let composite = std::iter::once(concern.as_str())
            .chain(state.answers.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        let matches = self
            .searcher
            .search(&composite, self.cfg.verse_top_k)
            .await
            .map_err(CounselError::Storage)?;
        let verse_context = render_verse_context(&matches);

        let prompt =
            prompts::analysis_prompt(&concern, &state.questions, &state.answers, &verse_context);
        let content = self
            .breaker
            .call(|| {
                retry_with_backoff(self.retry_attempts, self.retry_base, || {
                    self.llm.counsel(prompts::SYSTEM_COUNSELOR, &prompt)
                })
            })
            .await?;

        let mut verses = extract::extract_verse_refs(&content);
        if verses.is_empty() {
            verses = matches.iter().map(|m| m.verse_ref()).collect();
        }
        let prayer = extract::extract_prayer(&content);

        state.is_complete = true;
        state.advance(CounselingStep::Followup);
        self.persistence.save_counseling(&state).await?;

        info!(session_id = %state.session_id, "counseling analysis complete");

        Ok(ChatOutcome {
            content,
            verses,
            prayer,
            step: CounselingStep::Analysis,
            next_question: None,
            is_question_phase: false,
            progress: None,
        })
    }

    /// Terminal step: each message answered independently with a fresh
    /// search, no reference to prior answers.
    async fn handle_followup(
        &self,
        mut state: CounselingState,
        message: &str,
    ) -> Result<ChatOutcome, CounselError> {
        let matches = self
            .searcher
            .search(message, self.cfg.verse_top_k)
            .await
            .map_err(CounselError::Storage)?;
        let verse_context = render_verse_context(&matches);

        let prompt = prompts::followup_prompt(message, &verse_context);
        let content = self
            .breaker
            .call(|| {
                retry_with_backoff(self.retry_attempts, self.retry_base, || {
                    self.llm.counsel(prompts::SYSTEM_COUNSELOR, &prompt)
                })
            })
            .await?;

        let mut verses = extract::extract_verse_refs(&content);
        if verses.is_empty() {
            verses = matches.iter().map(|m| m.verse_ref()).collect();
        }
        let prayer = extract::extract_prayer(&content);

        state.advance(CounselingStep::Followup);
        self.persistence.save_counseling(&state).await?;

        Ok(ChatOutcome {
            content,
            verses,
            prayer,
            step: CounselingStep::Followup,
            next_question: None,
            is_question_phase: false,
            progress: None,
        })
    }
}

fn render_verse_context(matches: &[crate::verses::VerseMatch]) -> String {
    if matches.is_empty() {
        return "(관련 구절 없음)".to_string();
    }
    matches
        .iter()
        .map(|m| format!("{} {}:{} {}", m.book, m.chapter, m.verse, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}
