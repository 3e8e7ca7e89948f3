use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Which translation backend the service talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorBackend {
    /// Generic JSON endpoint: `{texts, targetLanguage} -> {translations}`
    Http,
    /// OpenAI chat completions
    OpenAi,
}

impl TranslatorBackend {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "openai" => Ok(Self::OpenAi),
            other => bail!("Unknown TRANSLATOR_BACKEND: '{}' (expected 'http' or 'openai')", other),
        }
    }
}

/// Pacing, backoff and batching parameters for the queue worker
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Minimum spacing between outbound API calls (scaled by the backoff multiplier)
    pub min_interval: Duration,
    /// Base wait after a rate-limit response (scaled by the backoff multiplier)
    pub retry_delay: Duration,
    /// Upper bound for the backoff multiplier
    pub max_backoff_multiplier: u32,
    /// Maximum number of texts sent in one API call
    pub max_batch_size: usize,
    /// Timeout for a single API call
    pub api_timeout: Duration,
}

impl QueueConfig {
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the backoff cap (values below 1 are clamped to 1)
    pub fn with_max_backoff_multiplier(mut self, cap: u32) -> Self {
        self.max_backoff_multiplier = cap.max(1);
        self
    }

    /// Set the batch size (values below 1 are clamped to 1)
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1000),
            retry_delay: Duration::from_millis(2000),
            max_backoff_multiplier: 8,
            max_batch_size: 30,
            api_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Translation backend
    pub translator_backend: TranslatorBackend,
    pub translate_api_url: Option<String>,
    pub translate_api_key: Option<String>,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // Persistent store
    pub database_url: Option<String>,

    // Languages
    pub source_language: String,

    // Queue
    pub queue: QueueConfig,
    pub debounce: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let translator_backend = TranslatorBackend::from_name(
            &std::env::var("TRANSLATOR_BACKEND").unwrap_or_else(|_| "http".to_string()),
        )?;

        let translate_api_url = non_empty_var("TRANSLATE_API_URL");
        let openai_api_key = non_empty_var("OPENAI_API_KEY");

        match translator_backend {
            TranslatorBackend::Http if translate_api_url.is_none() => {
                bail!("TRANSLATE_API_URL not set (required for the http backend)")
            }
            TranslatorBackend::OpenAi if openai_api_key.is_none() => {
                bail!("OPENAI_API_KEY not set (required for the openai backend)")
            }
            _ => {}
        }

        let defaults = QueueConfig::default();
        let queue = QueueConfig {
            min_interval: parse_var("TRANSLATION_MIN_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_interval),
            retry_delay: parse_var("TRANSLATION_RETRY_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            max_backoff_multiplier: defaults.max_backoff_multiplier,
            max_batch_size: defaults.max_batch_size,
            api_timeout: parse_var("TRANSLATION_API_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.api_timeout),
        }
        .with_max_backoff_multiplier(
            parse_var("TRANSLATION_MAX_BACKOFF")?
                .map(|v: u64| v.min(u32::MAX as u64) as u32)
                .unwrap_or(defaults.max_backoff_multiplier),
        )
        .with_max_batch_size(
            parse_var("TRANSLATION_MAX_BATCH_SIZE")?
                .map(|v: u64| v as usize)
                .unwrap_or(defaults.max_batch_size),
        );

        Ok(Self {
            translator_backend,
            translate_api_url,
            translate_api_key: non_empty_var("TRANSLATE_API_KEY"),

            openai_api_key,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),

            database_url: non_empty_var("DATABASE_URL"),

            source_language: std::env::var("SOURCE_LANGUAGE")
                .map(|v| v.trim().to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "en".to_string()),

            queue,
            debounce: parse_var("TRANSLATION_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_millis(150)),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional numeric variable. Unset is fine, garbage is an error.
fn parse_var(name: &str) -> Result<Option<u64>> {
    match non_empty_var(name) {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, value)),
        None => Ok(None),
    }
}
