use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::AppState;
use crate::api;
use crate::config::{AppConfig, LlmSettings};
use crate::counseling::CounselingService;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::persistence::PersistenceLayer;
use crate::persistence::providers::{memory::MemoryProvider, postgres::PostgresProvider};
use crate::resilience::{CircuitBreaker, RateLimiter};
use crate::verses::VerseSearcher;

/// Wire up shared state from a config, an LLM client, and a store.
pub fn build_state(
    config: Arc<AppConfig>,
    settings: LlmSettings,
    llm: Arc<dyn LlmClient>,
    persistence: Arc<dyn PersistenceLayer>,
) -> AppState {
    let resilience = &config.resilience;

    let rate_limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(resilience.rate_limit_window_secs),
        resilience.rate_limit_max_requests,
    ));

    let breaker = Arc::new(CircuitBreaker::new(Duration::from_secs(
        resilience.breaker_cooldown_secs,
    )));

    let searcher = VerseSearcher::new(
        Arc::clone(&llm),
        Arc::clone(&persistence),
        config.counseling.scan_limit,
    );

    let counseling = Arc::new(CounselingService::new(
        llm,
        Arc::clone(&persistence),
        searcher,
        breaker,
        config.counseling.clone(),
        resilience.retry_attempts,
        Duration::from_millis(resilience.retry_base_ms),
    ));

    AppState {
        counseling,
        persistence,
        rate_limiter,
        settings,
        config,
        started_at: Instant::now(),
    }
}

/// Build the router with middleware applied. Separated from [`start_server`]
/// so integration tests can drive it in-process.
pub fn build_app(state: AppState) -> Router {
    let timeout_duration = if state.config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60)
    } else {
        Duration::from_secs(30)
    };

    Router::new()
        .nest("/api", api::router())
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        mock = settings.mock,
        "LLM configuration loaded"
    );

    let llm: Arc<dyn LlmClient> = if settings.mock {
        info!("MOCK_AI_RESPONSES set, serving canned responses");
        Arc::new(MockLlmClient::new())
    } else {
        Arc::new(OpenAiClient::new(
            settings.clone(),
            Duration::from_secs(config.resilience.llm_timeout_secs),
        ))
    };

    let persistence: Arc<dyn PersistenceLayer> = match config.persistence.provider.as_str() {
        "memory" => {
            warn!("memory persistence selected, state is lost on restart");
            Arc::new(MemoryProvider::new())
        }
        _ if config.persistence.database_url.trim().is_empty() => {
            warn!("DATABASE_URL missing, falling back to memory persistence");
            Arc::new(MemoryProvider::new())
        }
        _ => {
            let provider = PostgresProvider::new(&config.persistence.database_url).await?;
            info!("Postgres persistence connected");
            Arc::new(provider)
        }
    };

    let state = build_state(config.clone(), settings, llm, persistence);

    spawn_retention_sweeper(&state);

    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Hourly sweep of counseling state past the retention window.
fn spawn_retention_sweeper(state: &AppState) {
    let persistence = Arc::clone(&state.persistence);
    let retention = chrono::Duration::hours(state.config.counseling.retention_hours as i64);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - retention;
            match persistence.delete_counseling_before(cutoff).await {
                Ok(0) => {}
                Ok(n) => info!(deleted = n, "swept expired counseling sessions"),
                Err(e) => error!(error = %e, "counseling retention sweep failed"),
            }
        }
    });
}
