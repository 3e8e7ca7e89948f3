//! Cached, rate-limited batch translation for UI strings.
//!
//! Resolution order for every text: in-memory cache, persistent store, then a
//! paced batch call to the translation API. Failures degrade to the original
//! text; callers never receive an error.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use translation_queue::{HttpTranslator, MemoryStore, QueueConfig, TranslationService};
//!
//! let translator = Arc::new(HttpTranslator::new(reqwest::Client::new(), url, None));
//! let service = TranslationService::new(translator, Arc::new(MemoryStore::new()), QueueConfig::default());
//!
//! let translated = service.add_request(vec!["Hello".into()], "id").await;
//! ```

pub mod adapters;
pub mod backoff;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openai;
pub mod queue;
pub mod store;
pub mod translator;

pub use adapters::{CollectionTranslator, StringTranslator};
pub use cache::TranslationCache;
pub use config::{Config, QueueConfig, TranslatorBackend};
pub use error::{StoreError, TranslateError};
pub use metrics::MetricsReport;
pub use openai::OpenAiTranslator;
pub use queue::TranslationService;
pub use store::{MemoryStore, PgStore, TranslationRecord, TranslationStore};
pub use translator::{HttpTranslator, Translator};
