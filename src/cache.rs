//! Process-lifetime memoization of `(language, text) -> translation`.
//!
//! Entries are never evicted or expired. The string space is static UI copy,
//! so unbounded growth for the life of one process is accepted.

use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory translation cache, keyed by target language then original text.
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a translation is cached
    pub fn has(&self, language: &str, text: &str) -> bool {
        self.entries
            .read()
            .get(language)
            .is_some_and(|by_text| by_text.contains_key(text))
    }

    /// Look up a cached translation
    pub fn get(&self, language: &str, text: &str) -> Option<String> {
        self.entries
            .read()
            .get(language)
            .and_then(|by_text| by_text.get(text))
            .cloned()
    }

    /// Insert or overwrite a translation. Last write wins.
    pub fn set(&self, language: &str, text: &str, translation: &str) {
        self.entries
            .write()
            .entry(language.to_string())
            .or_default()
            .insert(text.to_string(), translation.to_string());
    }

    /// Total number of cached entries across all languages
    pub fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
