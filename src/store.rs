use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use tracing::info;

/// One persisted translation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub original_text: String,
    pub translated_text: String,
    pub target_language: String,
}

impl TranslationRecord {
    pub fn new(original: &str, translated: &str, language: &str) -> Self {
        Self {
            original_text: original.to_string(),
            translated_text: translated.to_string(),
            target_language: language.to_string(),
        }
    }
}

/// Durable, cross-process storage of translations.
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Fetch existing rows for `texts`; missing texts are simply absent from the map
    async fn lookup(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<HashMap<String, String>, StoreError>;

    /// Insert-or-ignore keyed on `(original_text, target_language)`
    async fn upsert(&self, records: &[TranslationRecord]) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the `translations` table exists
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the translations table (safe to run always)
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                id BIGSERIAL PRIMARY KEY,
                original_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                target_language TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (original_text, target_language)
            )",
        )
        .execute(&self.pool)
        .await?;

        info!("✓ translations table ready");
        Ok(())
    }
}

#[async_trait]
impl TranslationStore for PgStore {
    async fn lookup(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        if texts.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT original_text, translated_text
             FROM translations
             WHERE original_text = ANY($1) AND target_language = $2",
        )
        .bind(texts)
        .bind(target_language)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn upsert(&self, records: &[TranslationRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let originals: Vec<String> = records.iter().map(|r| r.original_text.clone()).collect();
        let translated: Vec<String> = records.iter().map(|r| r.translated_text.clone()).collect();
        let languages: Vec<String> = records.iter().map(|r| r.target_language.clone()).collect();

        sqlx::query(
            "INSERT INTO translations (original_text, translated_text, target_language)
             SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
             ON CONFLICT (original_text, target_language) DO NOTHING",
        )
        .bind(originals)
        .bind(translated)
        .bind(languages)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-process store used when no database is configured, and in tests.
///
/// Keeps a log of every upsert batch so callers can inspect what was persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(String, String), String>>,
    upserts: Mutex<Vec<Vec<TranslationRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with rows
    pub fn with_records(records: impl IntoIterator<Item = TranslationRecord>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.lock();
            for record in records {
                rows.entry((record.target_language, record.original_text))
                    .or_insert(record.translated_text);
            }
        }
        store
    }

    /// Every upsert batch received, in call order
    pub fn upserts(&self) -> Vec<Vec<TranslationRecord>> {
        self.upserts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranslationStore for MemoryStore {
    async fn lookup(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<HashMap<String, String>, StoreError> {
        let rows = self.rows.lock();
        Ok(texts
            .iter()
            .filter_map(|text| {
                rows.get(&(target_language.to_string(), text.clone()))
                    .map(|translated| (text.clone(), translated.clone()))
            })
            .collect())
    }

    async fn upsert(&self, records: &[TranslationRecord]) -> Result<(), StoreError> {
        {
            let mut rows = self.rows.lock();
            for record in records {
                rows.entry((record.target_language.clone(), record.original_text.clone()))
                    .or_insert_with(|| record.translated_text.clone());
            }
        }
        self.upserts.lock().push(records.to_vec());
        Ok(())
    }
}
