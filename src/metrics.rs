//! Translation metrics and observability.
//!
//! Counters belong to one `TranslationService`; there is no process-wide
//! instance.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Texts answered from the in-memory cache
    memory_hits: AtomicUsize,

    /// Texts answered from the persistent store
    store_hits: AtomicUsize,

    /// Texts that had to be queued for the API
    queued_texts: AtomicUsize,

    /// Outbound API calls
    api_calls: AtomicUsize,

    /// API calls that failed for any reason (including rate limits)
    api_failures: AtomicUsize,

    /// API calls rejected with a rate-limit signal
    rate_limited: AtomicUsize,

    /// Failed store lookups or upserts
    store_errors: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hits(&self, count: usize) {
        self.memory_hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_store_hits(&self, count: usize) {
        self.store_hits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_queued(&self, count: usize) {
        self.queued_texts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Snapshot the counters.
    pub fn report(&self) -> MetricsReport {
        let memory_hits = self.memory_hits.load(Ordering::Relaxed);
        let store_hits = self.store_hits.load(Ordering::Relaxed);
        let queued_texts = self.queued_texts.load(Ordering::Relaxed);
        let total_lookups = memory_hits + store_hits + queued_texts;
        let cache_hit_rate = if total_lookups > 0 {
            ((memory_hits + store_hits) as f64 / total_lookups as f64) * 100.0
        } else {
            0.0
        };

        let api_calls = self.api_calls();
        let api_failures = self.api_failures.load(Ordering::Relaxed);
        let api_success_rate = if api_calls > 0 {
            (api_calls.saturating_sub(api_failures) as f64 / api_calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            memory_hits,
            store_hits,
            queued_texts,
            cache_hit_rate,
            api_calls,
            api_failures,
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            api_success_rate,
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub memory_hits: usize,
    pub store_hits: usize,
    pub queued_texts: usize,

    /// Share of texts resolved without the API, as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub api_calls: usize,
    pub api_failures: usize,
    pub rate_limited: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,

    pub store_errors: usize,
}
