//! Canned LLM responses for environments without API access.

use async_trait::async_trait;

use super::{LlmClient, LlmError};

/// Fixed exploration questions returned in mock mode.
pub const MOCK_QUESTIONS: [&str; 5] = [
    "이 고민이 시작된 것은 언제부터인가요?",
    "그 일로 인해 요즘 마음 상태는 어떠신가요?",
    "주변에 이 고민을 나눈 사람이 있나요?",
    "이 상황에서 가장 바라는 변화는 무엇인가요?",
    "신앙 안에서 이 문제를 어떻게 바라보고 계신가요?",
];

/// Canned counseling answer. Carries a verse citation and an
/// `오늘의 기도` section so the extraction path stays exercised.
pub const MOCK_COUNSEL: &str = "말씀드린 고민을 깊이 공감합니다. \
마태복음 11:28은 \"수고하고 무거운 짐 진 자들아 다 내게로 오라\"고 말합니다. \
지금의 무거움을 혼자 지려 하지 마시고, 작은 것부터 내려놓는 연습을 해보세요. \
시편 23:1의 고백처럼 부족함을 채우시는 분을 신뢰하시기 바랍니다.\n\n\
오늘의 기도: 주님, 지친 마음을 주님께 맡깁니다. 오늘 하루 평안을 허락해 주세요.";

/// No-network client returning fixed text keyed by request kind.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate_questions(
        &self,
        _concern: &str,
        count: usize,
    ) -> Result<Vec<String>, LlmError> {
        Ok(MOCK_QUESTIONS
            .iter()
            .take(count)
            .map(|q| (*q).to_string())
            .collect())
    }

    async fn counsel(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Ok(MOCK_COUNSEL.to_string())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        // Deterministic pseudo-embedding so similarity search stays usable
        // without network: fold bytes into a small fixed-length vector.
        let mut v = vec![0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += f32::from(b) / 255.0;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embed_is_deterministic() {
        let client = MockLlmClient::new();
        let a = client.embed("고민이 있어요").await.unwrap();
        let b = client.embed("고민이 있어요").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn mock_counsel_carries_citation_and_prayer() {
        let client = MockLlmClient::new();
        let text = client.counsel("", "").await.unwrap();
        assert!(text.contains("마태복음 11:28"));
        assert!(text.contains("오늘의 기도"));
    }
}
