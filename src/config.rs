use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;
use std::env;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Enable rate limiting
    #[arg(long, env = "RATE_LIMIT_ENABLED")]
    pub rate_limit_enabled: Option<bool>,

    /// Disable the request timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub resilience: ResilienceConfig,
    pub persistence: PersistenceConfig,
    pub counseling: CounselingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub rate_limit_enabled: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: usize,
    pub retry_attempts: usize,
    pub retry_base_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub llm_timeout_secs: u64,
    pub timeout_disabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    /// `postgres` or `memory`.
    pub provider: String,
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounselingConfig {
    /// Number of clarifying questions generated on the first message.
    pub question_count: usize,
    /// Answers collected before the composite analysis fires.
    pub analysis_threshold: usize,
    /// Verses returned per similarity search.
    pub verse_top_k: usize,
    /// Candidate cap for the linear similarity scan.
    pub scan_limit: usize,
    /// Counseling state older than this is swept.
    pub retention_hours: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("resilience.rate_limit_enabled", true)?
            .set_default("resilience.rate_limit_window_secs", 60)?
            .set_default("resilience.rate_limit_max_requests", 10)?
            .set_default("resilience.retry_attempts", 2)?
            .set_default("resilience.retry_base_ms", 500)?
            .set_default("resilience.breaker_cooldown_secs", 15)?
            .set_default("resilience.llm_timeout_secs", 15)?
            .set_default("resilience.timeout_disabled", false)?
            .set_default("persistence.provider", "postgres")?
            .set_default("persistence.database_url", "")?
            .set_default("counseling.question_count", 5)?
            .set_default("counseling.analysis_threshold", 4)?
            .set_default("counseling.verse_top_k", 5)?
            .set_default("counseling.scan_limit", 1000)?
            .set_default("counseling.retention_hours", 24)?;

        // Optional config file
        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables prefixed with COUNSEL_, e.g. COUNSEL_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("COUNSEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Direct env var the deployment scripts already set
        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                builder = builder.set_override("persistence.database_url", url)?;
            }
        }

        // CLI overrides win over everything
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(rl) = cli.rate_limit_enabled {
            builder = builder.set_override("resilience.rate_limit_enabled", rl)?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

/// LLM connection and model settings, loaded from plain env vars.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the OpenAI-compatible API.
    pub base_url: String,
    /// API key; absent means `/api/chat` reports the server misconfigured
    /// unless mock mode is on.
    pub api_key: Option<String>,
    /// Chat model identifier.
    pub model: String,
    /// Embeddings model identifier.
    pub embedding_model: String,
    /// Force canned responses, no outbound network calls.
    pub mock: bool,
}

pub fn load_llm_settings() -> LlmSettings {
    let base_url = env::var("LLM_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "https://api.openai.com".to_string());

    let api_key = env::var("OPENAI_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let model = env::var("OPENAI_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "gpt-4o-mini".to_string());

    let embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "text-embedding-3-small".to_string());

    let mock = env::var("MOCK_AI_RESPONSES").is_ok_and(|v| v == "1" || v == "true");

    LlmSettings {
        base_url,
        api_key,
        model,
        embedding_model,
        mock,
    }
}
