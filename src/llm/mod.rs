//! LLM client traits and implementations.
//!
//! The [`LlmClient`] trait is the seam between the counseling flow and the
//! outside world: chat completions, clarifying-question generation, and text
//! embeddings. Two implementations exist:
//!
//! - [`OpenAiClient`]: OpenAI-compatible Chat Completions + Embeddings APIs.
//! - [`MockLlmClient`]: canned responses, no network, for tests and
//!   `MOCK_AI_RESPONSES=1` environments.

pub mod mock;
pub mod openai;
pub mod prompts;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the LLM boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("embedding generation failed: {0}")]
    Embedding(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Client for the external model, used by the counseling flow.
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Generate `count` clarifying questions for the user's initial concern.
    async fn generate_questions(
        &self,
        concern: &str,
        count: usize,
    ) -> Result<Vec<String>, LlmError>;

    /// One counseling completion for the given system/user prompt pair.
    async fn counsel(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Embed a single text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Parse a numbered or bulleted question list out of model prose.
pub(crate) fn parse_question_list(text: &str, count: usize) -> Vec<String> {
    let mut questions = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Strip "1.", "1)", "-", "*" prefixes
        let stripped = line
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start_matches(['.', ')', '-', '*'])
            .trim();
        if stripped.ends_with('?') || stripped.ends_with("요.") || stripped.ends_with("까") {
            questions.push(stripped.to_string());
        }
    }
    questions.truncate(count);
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_questions() {
        let text = "1. 언제부터 그런 마음이 들었나요?\n2) 주변에 이야기해 본 적이 있나요?\n- 지금 가장 힘든 점은 무엇인가요?\n\n이상입니다.";
        let qs = parse_question_list(text, 5);
        assert_eq!(qs.len(), 3);
        assert_eq!(qs[0], "언제부터 그런 마음이 들었나요?");
        assert_eq!(qs[2], "지금 가장 힘든 점은 무엇인가요?");
    }

    #[test]
    fn truncates_to_requested_count() {
        let text = "1. 하나?\n2. 둘?\n3. 셋?\n4. 넷?\n5. 다섯?\n6. 여섯?";
        let qs = parse_question_list(text, 4);
        assert_eq!(qs.len(), 4);
    }
}
