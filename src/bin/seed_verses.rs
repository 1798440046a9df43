//! Offline verse seeding CLI.
//!
//! Loads a JSON verse file into the store, then computes embeddings for any
//! verse still missing one, with a fixed delay between API calls to stay
//! under the provider's rate limit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};

use verse_counsel::config::load_llm_settings;
use verse_counsel::llm::{LlmClient, MockLlmClient, OpenAiClient};
use verse_counsel::persistence::PersistenceLayer;
use verse_counsel::persistence::providers::postgres::PostgresProvider;
use verse_counsel::telemetry;
use verse_counsel::verses::VerseRecord;

/// Delay between embedding calls.
const EMBED_DELAY: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about = "Seed the bible verse store")]
struct Args {
    /// JSON file with [{book, chapter, verse, text, translation}] records
    #[arg(long, default_value = "data/verses.json")]
    file: String,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Drop all stored verses and exit
    #[arg(long)]
    clear: bool,

    /// Skip embedding generation
    #[arg(long)]
    skip_embeddings: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    telemetry::init();

    let args = Args::parse();
    let persistence = PostgresProvider::new(&args.database_url)
        .await
        .context("failed to connect to database")?;

    if args.clear {
        let n = persistence.clear_verses().await?;
        info!(deleted = n, "verse store cleared");
        return Ok(());
    }

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file))?;
    let records: Vec<VerseRecord> =
        serde_json::from_str(&raw).context("verse file is not valid JSON")?;

    info!(count = records.len(), "upserting verse records");
    for record in &records {
        persistence.upsert_verse(record).await?;
    }

    if args.skip_embeddings {
        return Ok(());
    }

    let settings = load_llm_settings();
    let llm: Arc<dyn LlmClient> = if settings.mock {
        warn!("MOCK_AI_RESPONSES set, generating deterministic mock embeddings");
        Arc::new(MockLlmClient::new())
    } else if settings.api_key.is_none() {
        warn!("OPENAI_API_KEY not set, skipping embedding generation");
        return Ok(());
    } else {
        Arc::new(OpenAiClient::new(settings, Duration::from_secs(15)))
    };

    let pending = persistence.list_unembedded_verses().await?;
    info!(count = pending.len(), "generating embeddings");

    let total = pending.len();
    for (i, mut verse) in pending.into_iter().enumerate() {
        match llm.embed(&verse.text).await {
            Ok(embedding) => {
                verse.embedding = Some(embedding);
                persistence.upsert_verse(&verse).await?;
            }
            Err(e) => {
                warn!(
                    verse = %verse.verse_ref(),
                    error = %e,
                    "embedding generation failed, continuing"
                );
            }
        }

        if (i + 1) % 10 == 0 {
            info!(done = i + 1, total, "embedding progress");
        }
        tokio::time::sleep(EMBED_DELAY).await;
    }

    info!("verse seeding complete");
    Ok(())
}
