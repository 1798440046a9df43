//! History retrieval tests: persistence round-trip, pagination, filtering.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use verse_counsel::config::{
    AppConfig, CounselingConfig, LlmSettings, PersistenceConfig, ResilienceConfig, ServerConfig,
};
use verse_counsel::llm::{LlmClient, MockLlmClient};
use verse_counsel::persistence::providers::memory::MemoryProvider;
use verse_counsel::persistence::{ChatTurn, PersistenceLayer, TurnRole};
use verse_counsel::server::{build_app, build_state};
use verse_counsel::verses::VerseRef;

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        resilience: ResilienceConfig {
            rate_limit_enabled: false,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 10,
            retry_attempts: 0,
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

fn server_with_store() -> (TestServer, Arc<MemoryProvider>) {
    let provider = Arc::new(MemoryProvider::new());
    let persistence: Arc<dyn PersistenceLayer> = provider.clone();
    let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
    let state = build_state(Arc::new(test_config()), mock_settings(), llm, persistence);
    (TestServer::new(build_app(state)).unwrap(), provider)
}

fn turn(session_id: &str, role: TurnRole, content: &str, offset_secs: i64) -> ChatTurn {
    ChatTurn {
        session_id: session_id.to_string(),
        role,
        content: content.to_string(),
        verses: Vec::new(),
        prayer: None,
        created_at: Utc::now() + Duration::seconds(offset_secs),
    }
}

#[tokio::test]
async fn persisted_turn_round_trips_with_verses_and_prayer() {
    let (server, store) = server_with_store();

    let mut with_verses = turn("s-rt", TurnRole::Assistant, "위로의 말씀입니다", 0);
    with_verses.verses = vec![VerseRef {
        book: "마태복음".to_string(),
        chapter: 11,
        verse: 28,
    }];
    with_verses.prayer = Some("주님, 평안을 주소서.".to_string());
    store.append_turn(&with_verses).await.unwrap();

    let res = server.get("/api/history").add_query_param("sessionId", "s-rt").await;
    res.assert_status_ok();

    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["role"], json!("assistant"));
    assert_eq!(items[0]["content"], json!("위로의 말씀입니다"));
    assert_eq!(items[0]["verses"][0]["book"], json!("마태복음"));
    assert_eq!(items[0]["verses"][0]["chapter"], json!(11));
    assert_eq!(items[0]["verses"][0]["verse"], json!(28));
    assert_eq!(items[0]["prayer"], json!("주님, 평안을 주소서."));
    assert!(body.get("nextCursor").is_none());
}

#[tokio::test]
async fn chat_turns_appear_in_history_in_order() {
    let (server, _store) = server_with_store();

    let res = server
        .post("/api/chat")
        .json(&json!({ "sessionId": "s-chat", "message": "고민이 있어요" }))
        .await;
    res.assert_status_ok();

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-chat")
        .await;
    res.assert_status_ok();

    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["role"], json!("user"));
    assert_eq!(items[0]["content"], json!("고민이 있어요"));
    assert_eq!(items[1]["role"], json!("assistant"));
}

#[tokio::test]
async fn pagination_follows_the_cursor() {
    let (server, store) = server_with_store();

    for i in 0..3 {
        store
            .append_turn(&turn("s-page", TurnRole::User, &format!("메시지 {i}"), i))
            .await
            .unwrap();
    }

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-page")
        .add_query_param("limit", "2")
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    let cursor = body["nextCursor"].as_str().unwrap().to_string();

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-page")
        .add_query_param("limit", "2")
        .add_query_param("cursor", &cursor)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], json!("메시지 2"));
    assert!(body.get("nextCursor").is_none());
}

#[tokio::test]
async fn substring_filter_is_case_insensitive() {
    let (server, store) = server_with_store();

    store
        .append_turn(&turn("s-q", TurnRole::User, "Anxiety about work", 0))
        .await
        .unwrap();
    store
        .append_turn(&turn("s-q", TurnRole::User, "가족 이야기", 1))
        .await
        .unwrap();

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-q")
        .add_query_param("q", "anxiety")
        .await;
    res.assert_status_ok();

    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], json!("Anxiety about work"));
}

#[tokio::test]
async fn date_range_filters_turns() {
    let (server, store) = server_with_store();

    let base = Utc::now();
    for i in 0..3 {
        store
            .append_turn(&turn("s-range", TurnRole::User, &format!("메시지 {i}"), i * 60))
            .await
            .unwrap();
    }

    let from = (base + Duration::seconds(30)).to_rfc3339();
    let to = (base + Duration::seconds(90)).to_rfc3339();

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-range")
        .add_query_param("from", &from)
        .add_query_param("to", &to)
        .await;
    res.assert_status_ok();

    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], json!("메시지 1"));
}

#[tokio::test]
async fn missing_session_id_is_400() {
    let (server, _store) = server_with_store();

    let res = server.get("/api/history").await;
    assert_eq!(res.status_code(), 400);

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "")
        .await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn sessions_do_not_leak_into_each_other() {
    let (server, store) = server_with_store();

    store
        .append_turn(&turn("s-one", TurnRole::User, "첫 세션", 0))
        .await
        .unwrap();
    store
        .append_turn(&turn("s-two", TurnRole::User, "둘째 세션", 0))
        .await
        .unwrap();

    let res = server
        .get("/api/history")
        .add_query_param("sessionId", "s-one")
        .await;
    res.assert_status_ok();

    let body: Value = res.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content"], json!("첫 세션"));
}
