//! Bible counseling chat server entry point.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;

use verse_counsel::config::{AppConfig, load_llm_settings};
use verse_counsel::{server, telemetry};

#[tokio::main]
async fn main() {
    // Load .env (if present) before anything reads the environment.
    let _ = dotenv();

    telemetry::init();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = load_llm_settings();

    if let Err(e) = server::start_server(config, settings).await {
        eprintln!("Server error: {e:?}");
        std::process::exit(1);
    }
}
