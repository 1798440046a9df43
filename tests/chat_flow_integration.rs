//! End-to-end chat flow tests against the in-process router, using the
//! memory provider and the mock LLM client.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{Value, json};

use verse_counsel::config::{
    AppConfig, CounselingConfig, LlmSettings, PersistenceConfig, ResilienceConfig, ServerConfig,
};
use verse_counsel::llm::{LlmClient, LlmError, MockLlmClient};
use verse_counsel::persistence::PersistenceLayer;
use verse_counsel::persistence::providers::memory::MemoryProvider;
use verse_counsel::server::{build_app, build_state};

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        resilience: ResilienceConfig {
            rate_limit_enabled: true,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 10,
            retry_attempts: 2,
            retry_base_ms: 1,
            breaker_cooldown_secs: 15,
            llm_timeout_secs: 15,
            timeout_disabled: false,
        },
        persistence: PersistenceConfig {
            provider: "memory".to_string(),
            database_url: String::new(),
        },
        counseling: CounselingConfig {
            question_count: 5,
            analysis_threshold: 4,
            verse_top_k: 5,
            scan_limit: 1000,
            retention_hours: 24,
        },
    }
}

fn mock_settings() -> LlmSettings {
    LlmSettings {
        base_url: "http://localhost".to_string(),
        api_key: None,
        model: "gpt-4o-mini".to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        mock: true,
    }
}

fn mock_server() -> TestServer {
    let config = Arc::new(test_config());
    let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
    let persistence: Arc<dyn PersistenceLayer> = Arc::new(MemoryProvider::new());
    let state = build_state(config, mock_settings(), llm, persistence);
    TestServer::new(build_app(state)).unwrap()
}

/// Upstream that fails every call, as if the provider were down.
#[derive(Debug, Clone)]
struct UnavailableLlm;

#[async_trait::async_trait]
impl LlmClient for UnavailableLlm {
    async fn generate_questions(
        &self,
        _concern: &str,
        _count: usize,
    ) -> Result<Vec<String>, LlmError> {
        Err(LlmError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    async fn counsel(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::Embedding("service unavailable".to_string()))
    }
}

async fn post_chat(server: &TestServer, session_id: &str, message: &str) -> axum_test::TestResponse {
    server
        .post("/api/chat")
        .json(&json!({ "sessionId": session_id, "message": message }))
        .await
}

#[tokio::test]
async fn initial_message_returns_canned_questions_and_progress() {
    let server = mock_server();

    let res = post_chat(&server, "s-init", "요즘 너무 불안해요").await;
    res.assert_status_ok();

    let body: Value = res.json();
    assert_eq!(body["mocked"], json!(true));
    assert_eq!(body["counselingStep"], json!("exploration"));
    assert_eq!(body["isQuestionPhase"], json!(true));
    assert_eq!(body["progress"], json!({ "current": 0, "total": 5 }));
    assert!(body["content"].as_str().unwrap().contains("?"));
    assert!(body["nextQuestion"].as_str().is_some());
}

#[tokio::test]
async fn fourth_answer_triggers_analysis_with_citation_and_prayer() {
    let server = mock_server();
    let sid = "s-flow";

    post_chat(&server, sid, "직장 문제로 고민이 많습니다").await.assert_status_ok();

    // Three answers stay in the question phase.
    for (i, answer) in ["작년부터요", "많이 지쳤어요", "아직 없어요"].iter().enumerate() {
        let res = post_chat(&server, sid, answer).await;
        res.assert_status_ok();
        let body: Value = res.json();
        assert_eq!(body["counselingStep"], json!("exploration"));
        assert_eq!(body["isQuestionPhase"], json!(true));
        assert_eq!(body["progress"]["current"], json!(i + 1));
    }

    // Fourth answer crosses the threshold.
    let res = post_chat(&server, sid, "마음의 평안을 찾고 싶어요").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["counselingStep"], json!("analysis"));
    assert_eq!(body["isQuestionPhase"], json!(false));

    let content = body["content"].as_str().unwrap();
    assert!(content.contains("마태복음 11:28"));
    assert!(!body["prayer"].as_str().unwrap().is_empty());

    let verses = body["verses"].as_array().unwrap();
    assert!(verses.iter().any(|v| v["book"] == json!("마태복음")));

    // Afterwards every message is handled independently.
    let res = post_chat(&server, sid, "감사합니다").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["counselingStep"], json!("followup"));
}

#[tokio::test]
async fn eleventh_rapid_call_is_rate_limited() {
    let server = mock_server();

    for i in 0..10 {
        post_chat(&server, "s-limit", &format!("메시지 {i}"))
            .await
            .assert_status_ok();
    }

    let res = post_chat(&server, "s-limit", "한 번 더").await;
    assert_eq!(res.status_code(), 429);

    let body: Value = res.json();
    assert!(body["retryAfterSeconds"].as_u64().unwrap() >= 1);
    assert!(res.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let server = mock_server();

    for i in 0..10 {
        let res = server
            .post("/api/chat")
            .add_header("x-forwarded-for", "10.0.0.1")
            .json(&json!({ "sessionId": "s-a", "message": format!("메시지 {i}") }))
            .await;
        res.assert_status_ok();
    }

    let res = server
        .post("/api/chat")
        .add_header("x-forwarded-for", "10.0.0.1")
        .json(&json!({ "sessionId": "s-a", "message": "한 번 더" }))
        .await;
    assert_eq!(res.status_code(), 429);

    // A different forwarded IP still gets through.
    let res = server
        .post("/api/chat")
        .add_header("x-forwarded-for", "10.0.0.2")
        .json(&json!({ "sessionId": "s-b", "message": "안녕하세요" }))
        .await;
    res.assert_status_ok();
}

#[tokio::test]
async fn malformed_body_is_rejected_with_400() {
    let server = mock_server();

    let res = server
        .post("/api/chat")
        .json(&json!({ "sessionId": "s-bad" }))
        .await;
    assert_eq!(res.status_code(), 400);

    let res = server
        .post("/api/chat")
        .json(&json!({ "sessionId": "", "message": "내용" }))
        .await;
    assert_eq!(res.status_code(), 400);

    let res = server
        .post("/api/chat")
        .json(&json!({ "sessionId": "s-bad", "message": "" }))
        .await;
    assert_eq!(res.status_code(), 400);

    let res = server
        .post("/api/chat")
        .json(&json!({ "sessionId": "s-bad", "message": "가".repeat(2001) }))
        .await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn llm_failure_after_retries_is_502_and_opens_the_circuit() {
    let config = Arc::new(test_config());
    let llm: Arc<dyn LlmClient> = Arc::new(UnavailableLlm);
    let persistence: Arc<dyn PersistenceLayer> = Arc::new(MemoryProvider::new());
    let state = build_state(config, mock_settings(), llm, persistence);
    let server = TestServer::new(build_app(state)).unwrap();

    // Retries are exhausted against the dead upstream.
    let res = post_chat(&server, "s-down", "고민이 있어요").await;
    assert_eq!(res.status_code(), 502);
    let body: Value = res.json();
    assert!(body["message"].as_str().unwrap().contains("503"));

    // The failure opened the circuit; the next call is short-circuited.
    let res = post_chat(&server, "s-down", "다시 시도합니다").await;
    assert_eq!(res.status_code(), 502);
    let body: Value = res.json();
    assert!(body["message"].as_str().unwrap().contains("circuit open"));
}

#[tokio::test]
async fn missing_api_key_without_mock_is_500() {
    let config = Arc::new(test_config());
    let settings = LlmSettings {
        mock: false,
        ..mock_settings()
    };
    let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
    let persistence: Arc<dyn PersistenceLayer> = Arc::new(MemoryProvider::new());
    let state = build_state(config, settings, llm, persistence);
    let server = TestServer::new(build_app(state)).unwrap();

    let res = post_chat(&server, "s-nokey", "고민이 있어요").await;
    assert_eq!(res.status_code(), 500);
    let body: Value = res.json();
    assert!(body["message"].as_str().unwrap().contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn health_reports_connected_database_and_mock_environment() {
    let server = mock_server();

    let res = server.get("/api/health").await;
    res.assert_status_ok();

    let body: Value = res.json();
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["services"]["database"], json!("connected"));
    assert_eq!(body["services"]["openai"], json!("missing"));
    assert_eq!(body["environment"]["mock"], json!(true));
}

#[tokio::test]
async fn metrics_reports_uptime_and_database_status() {
    let server = mock_server();

    let res = server.get("/api/metrics").await;
    res.assert_status_ok();

    let body: Value = res.json();
    assert!(body["uptime"].as_str().unwrap().ends_with('s'));
    assert_eq!(body["database"]["status"], json!("connected"));
}
