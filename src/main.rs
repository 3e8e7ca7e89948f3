//! Translate strings through the cached, rate-limited queue.
//!
//! Usage:
//!   cargo run -- id "Hello" "Contact us"     # translate arguments to Indonesian
//!   cat strings.txt | cargo run -- es         # one string per line from stdin
//!
//! Required environment variables:
//! - TRANSLATE_API_URL (http backend) or OPENAI_API_KEY (TRANSLATOR_BACKEND=openai)
//!
//! Optional:
//! - DATABASE_URL (persist translations in PostgreSQL; in-memory otherwise)
//! - SOURCE_LANGUAGE (defaults to en)
//! - TRANSLATION_* tuning variables, see config.rs

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::info;
use translation_queue::{
    config::{Config, TranslatorBackend},
    HttpTranslator, MemoryStore, OpenAiTranslator, PgStore, StringTranslator, TranslationService,
    TranslationStore, Translator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only translations
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_queue=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(language) = args.next() else {
        bail!("Usage: translate <language> [text ...]");
    };
    let mut texts: Vec<String> = args.collect();

    if texts.is_empty() {
        texts = std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read texts from stdin")?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
    }

    let config = Config::from_env()?;
    let service = build_service(&config).await?;

    // Each line joins the same debounce window, so they go out as one batch
    let strings = StringTranslator::new(
        Arc::clone(&service),
        config.source_language.clone(),
        config.debounce,
    );
    info!("Translating {} texts to {}", texts.len(), language);
    let translated = join_all(texts.iter().map(|text| strings.translate(text, &language))).await;

    let mut stdout = std::io::stdout().lock();
    for line in &translated {
        writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
    }
    drop(stdout);

    service.drain_persistence().await;

    let report = serde_json::to_string(&service.metrics())?;
    info!("Translation metrics: {}", report);

    Ok(())
}

async fn build_service(config: &Config) -> Result<Arc<TranslationService>> {
    let client = reqwest::Client::builder()
        .timeout(config.queue.api_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let translator: Arc<dyn Translator> = match config.translator_backend {
        TranslatorBackend::Http => {
            let url = config
                .translate_api_url
                .clone()
                .context("TRANSLATE_API_URL not set")?;
            Arc::new(HttpTranslator::new(client, url, config.translate_api_key.clone()))
        }
        TranslatorBackend::OpenAi => {
            let key = config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY not set")?;
            Arc::new(OpenAiTranslator::new(
                client,
                config.openai_api_url.clone(),
                key,
                config.openai_model.clone(),
            ))
        }
    };

    let store: Arc<dyn TranslationStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url)
                .await
                .context("Failed to connect to translation store")?,
        ),
        None => {
            info!("DATABASE_URL not set, translations will not outlive this process");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(TranslationService::new(translator, store, config.queue.clone()))
}
