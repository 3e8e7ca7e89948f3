//! The translation coordinator.
//!
//! `add_request` resolves what it can from the in-memory cache and the
//! persistent store, then parks the rest on a shared pending queue drained by
//! a single background worker:
//!
//! ```text
//! Idle -> Draining -> Calling -> Success ------------------> Idle
//!                              -> RateLimited -> Backoff -> Draining
//!                              -> OtherError -> fallback -> Idle
//! ```
//!
//! Callers never see an error. The worst outcome is getting back the texts
//! they sent, untranslated.

use crate::backoff::Backoff;
use crate::batch::{take_same_language, BatchPlan, QueuedRequest};
use crate::cache::TranslationCache;
use crate::config::QueueConfig;
use crate::error::TranslateError;
use crate::metrics::{MetricsReport, TranslationMetrics};
use crate::store::{TranslationRecord, TranslationStore};
use crate::translator::{check_count, Translator};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

struct WorkerState {
    pending: VecDeque<QueuedRequest>,
    /// Reentrancy guard: at most one worker task at a time
    running: bool,
    backoff: Backoff,
}

/// Shared translation service. Construct once per process and hand out the `Arc`.
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    store: Arc<dyn TranslationStore>,
    cache: Arc<TranslationCache>,
    config: QueueConfig,
    metrics: Arc<TranslationMetrics>,
    state: Mutex<WorkerState>,
    persist_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TranslationService {
    pub fn new(
        translator: Arc<dyn Translator>,
        store: Arc<dyn TranslationStore>,
        config: QueueConfig,
    ) -> Arc<Self> {
        Self::with_cache(translator, store, Arc::new(TranslationCache::new()), config)
    }

    /// Build a service around an existing cache
    pub fn with_cache(
        translator: Arc<dyn Translator>,
        store: Arc<dyn TranslationStore>,
        cache: Arc<TranslationCache>,
        mut config: QueueConfig,
    ) -> Arc<Self> {
        // Fields are public, so struct literals can bypass the `with_*` clamps
        config.max_batch_size = config.max_batch_size.max(1);
        config.max_backoff_multiplier = config.max_backoff_multiplier.max(1);

        let backoff = Backoff::new(config.max_backoff_multiplier);
        Arc::new(Self {
            translator,
            store,
            cache,
            config,
            metrics: Arc::new(TranslationMetrics::new()),
            state: Mutex::new(WorkerState {
                pending: VecDeque::new(),
                running: false,
                backoff,
            }),
            persist_tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    /// Number of requests waiting for the worker
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn backoff_multiplier(&self) -> u32 {
        self.state.lock().backoff.multiplier()
    }

    /// Translate `texts` into `language`.
    ///
    /// The result always has the same length and order as `texts`. Any text
    /// that cannot be translated comes back unchanged.
    pub async fn add_request(self: &Arc<Self>, texts: Vec<String>, language: &str) -> Vec<String> {
        if texts.is_empty() {
            return texts;
        }

        let mut resolved: Vec<Option<String>> =
            texts.iter().map(|t| self.cache.get(language, t)).collect();
        self.metrics
            .record_memory_hits(resolved.iter().filter(|r| r.is_some()).count());

        let mut seen = HashSet::new();
        let missing: Vec<String> = texts
            .iter()
            .zip(&resolved)
            .filter(|(_, hit)| hit.is_none())
            .map(|(text, _)| text.clone())
            .filter(|text| seen.insert(text.clone()))
            .collect();

        if missing.is_empty() {
            return resolved.into_iter().flatten().collect();
        }

        let mut found = self.lookup_store(&missing, language).await;

        let queued: Vec<String> = missing
            .into_iter()
            .filter(|text| !found.contains_key(text))
            .collect();

        if !queued.is_empty() {
            self.metrics.record_queued(queued.len());
            let (request, receiver) = QueuedRequest::new(queued.clone(), language);
            self.enqueue(request);

            // The sender is only dropped without a value if the worker died
            let translated = receiver.await.unwrap_or_else(|_| queued.clone());
            found.extend(queued.into_iter().zip(translated));
        }

        for (slot, text) in resolved.iter_mut().zip(&texts) {
            if slot.is_none() {
                *slot = Some(found.get(text).cloned().unwrap_or_else(|| text.clone()));
            }
        }
        resolved.into_iter().flatten().collect()
    }

    /// Wait for outstanding fire-and-forget store writes
    pub async fn drain_persistence(&self) {
        let tasks = std::mem::take(&mut *self.persist_tasks.lock());
        if tasks.is_empty() {
            return;
        }
        debug!("Waiting for {} persistence task(s)", tasks.len());
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!("Persistence task failed: {}", e);
            }
        }
    }

    /// Batched store lookup. Errors count as "no rows".
    async fn lookup_store(&self, texts: &[String], language: &str) -> HashMap<String, String> {
        match self.store.lookup(texts, language).await {
            Ok(rows) => {
                let requested: HashSet<&str> = texts.iter().map(String::as_str).collect();
                let found: HashMap<String, String> = rows
                    .into_iter()
                    .filter(|(original, _)| requested.contains(original.as_str()))
                    .collect();
                for (original, translated) in &found {
                    self.cache.set(language, original, translated);
                }
                self.metrics.record_store_hits(found.len());
                found
            }
            Err(e) => {
                warn!("Translation store lookup failed for {}: {}", language, e);
                self.metrics.record_store_error();
                HashMap::new()
            }
        }
    }

    fn enqueue(self: &Arc<Self>, request: QueuedRequest) {
        let start_worker = {
            let mut state = self.state.lock();
            state.pending.push_back(request);
            !std::mem::replace(&mut state.running, true)
        };

        if start_worker {
            let service = Arc::clone(self);
            tokio::spawn(async move { service.run_worker().await });
        }
    }

    async fn run_worker(self: Arc<Self>) {
        debug!("Translation worker started");

        loop {
            let wait = {
                let state = self.state.lock();
                state
                    .backoff
                    .pacing_delay(self.config.min_interval, Instant::now())
            };
            if !wait.is_zero() {
                sleep(wait).await;
            }

            let mut requests = {
                let mut state = self.state.lock();
                let selected = take_same_language(&mut state.pending);
                if selected.is_empty() {
                    state.running = false;
                    debug!("Translation worker idle");
                    return;
                }
                selected
            };

            let language = requests[0].language.clone();
            let plan = BatchPlan::build(&requests, self.config.max_batch_size, |text| {
                self.cache.get(&language, text)
            });

            if plan.texts().is_empty() {
                plan.apply(&mut requests, None);
                self.finish(requests);
                continue;
            }

            debug!(
                "Translating {} texts for {} request(s) to {}",
                plan.texts().len(),
                requests.len(),
                language
            );

            match self.call_api(plan.texts(), &language).await {
                Ok(translations) => {
                    self.state.lock().backoff.record_success();

                    for (text, translation) in plan.texts().iter().zip(&translations) {
                        self.cache.set(&language, text, translation);
                    }
                    self.persist(&language, plan.texts(), &translations);

                    info!("✓ Translated {} texts to {}", translations.len(), language);
                    plan.apply(&mut requests, Some(&translations));
                    self.finish(requests);
                }
                Err(e) if e.is_rate_limited() => {
                    self.metrics.record_rate_limited();
                    let delay = {
                        let mut state = self.state.lock();
                        state.backoff.record_failure();
                        for request in requests.into_iter().rev() {
                            state.pending.push_front(request);
                        }
                        state.backoff.scaled(self.config.retry_delay)
                    };
                    warn!(
                        "Translation API rate limited ({}), retrying {} in {:?}",
                        e, language, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    self.state.lock().backoff.record_failure();
                    warn!(
                        "Translation to {} failed, falling back to original text: {}",
                        language, e
                    );
                    plan.apply(&mut requests, None);
                    for request in requests {
                        request.resolve();
                    }
                }
            }
        }
    }

    /// One paced, time-limited API call
    async fn call_api(&self, texts: &[String], language: &str) -> Result<Vec<String>, TranslateError> {
        self.state.lock().backoff.mark_call(Instant::now());
        self.metrics.record_api_call();

        // Backend panics become a hard failure; the worker and its running flag survive
        let call = AssertUnwindSafe(self.translator.translate(texts, language)).catch_unwind();
        let result = match timeout(self.config.api_timeout, call).await {
            Ok(Ok(result)) => result.and_then(|translations| check_count(texts.len(), translations)),
            Ok(Err(panic)) => Err(TranslateError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(TranslateError::Timeout(self.config.api_timeout)),
        };

        if result.is_err() {
            self.metrics.record_api_failure();
        }
        result
    }

    /// Complete finished requests; requeue overflowed ones at the front
    fn finish(&self, requests: Vec<QueuedRequest>) {
        let (complete, partial): (Vec<_>, Vec<_>) =
            requests.into_iter().partition(QueuedRequest::is_complete);

        for request in complete {
            request.resolve();
        }

        if !partial.is_empty() {
            debug!("Deferring {} request(s) past the batch cap", partial.len());
            let mut state = self.state.lock();
            for request in partial.into_iter().rev() {
                state.pending.push_front(request);
            }
        }
    }

    /// Write new translations to the store without waiting for it
    fn persist(&self, language: &str, texts: &[String], translations: &[String]) {
        let records: Vec<TranslationRecord> = texts
            .iter()
            .zip(translations)
            .filter(|(original, translated)| original != translated)
            .map(|(original, translated)| TranslationRecord::new(original, translated, language))
            .collect();

        if records.is_empty() {
            return;
        }

        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        let handle = tokio::spawn(async move {
            if let Err(e) = store.upsert(&records).await {
                warn!("Failed to persist {} translations: {}", records.len(), e);
                metrics.record_store_error();
            }
        });

        let mut tasks = self.persist_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Uppercases everything and counts calls
    #[derive(Default)]
    struct UpperTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for UpperTranslator {
        async fn translate(&self, texts: &[String], _: &str) -> Result<Vec<String>, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    fn fast_config() -> QueueConfig {
        QueueConfig::default()
            .with_min_interval(Duration::from_millis(10))
            .with_retry_delay(Duration::from_millis(10))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_request_returns_immediately() {
        let translator = Arc::new(UpperTranslator::default());
        let service = TranslationService::new(translator.clone(), Arc::new(MemoryStore::new()), fast_config());

        let result = service.add_request(Vec::new(), "id").await;

        assert!(result.is_empty());
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_worker_goes_idle_after_draining() {
        let translator = Arc::new(UpperTranslator::default());
        let service = TranslationService::new(translator.clone(), Arc::new(MemoryStore::new()), fast_config());

        let result = service.add_request(strings(&["a", "b"]), "id").await;
        assert_eq!(result, vec!["A", "B"]);

        // Let the worker observe the empty queue
        for _ in 0..100 {
            if !service.state.lock().running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!service.state.lock().running);
        assert_eq!(service.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_duplicates_in_one_request_are_translated_once() {
        let translator = Arc::new(UpperTranslator::default());
        let store = Arc::new(MemoryStore::new());
        let service = TranslationService::new(translator.clone(), store.clone(), fast_config());

        let result = service.add_request(strings(&["a", "a", "b", "a"]), "id").await;
        assert_eq!(result, vec!["A", "A", "B", "A"]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);

        service.drain_persistence().await;
        assert_eq!(store.upserts().len(), 1);
        assert_eq!(store.upserts()[0].len(), 2);
    }

    #[tokio::test]
    async fn test_identity_translations_are_not_persisted() {
        let translator = Arc::new(UpperTranslator::default());
        let store = Arc::new(MemoryStore::new());
        let service = TranslationService::new(translator, store.clone(), fast_config());

        // "OK" uppercases to itself
        let result = service.add_request(strings(&["OK", "ok"]), "id").await;
        assert_eq!(result, vec!["OK", "OK"]);

        service.drain_persistence().await;
        let upserts = store.upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0], vec![TranslationRecord::new("ok", "OK", "id")]);
        // Both are cached regardless
        assert!(service.cache().has("id", "OK"));
        assert!(service.cache().has("id", "ok"));
    }

    #[tokio::test]
    async fn test_zero_batch_size_literal_is_clamped() {
        let translator = Arc::new(UpperTranslator::default());
        let config = QueueConfig {
            max_batch_size: 0,
            max_backoff_multiplier: 0,
            ..fast_config()
        };
        let service = TranslationService::new(translator.clone(), Arc::new(MemoryStore::new()), config);

        assert_eq!(service.config().max_batch_size, 1);
        assert_eq!(service.config().max_backoff_multiplier, 1);

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            service.add_request(strings(&["a", "b"]), "id"),
        )
        .await
        .expect("Worker should not spin on an empty plan");
        assert_eq!(result, vec!["A", "B"]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
    }

    /// Panics on the first call, uppercases afterwards
    #[derive(Default)]
    struct PanicOnceTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for PanicOnceTranslator {
        async fn translate(&self, texts: &[String], _: &str) -> Result<Vec<String>, TranslateError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("backend exploded");
            }
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }
    }

    #[tokio::test]
    async fn test_panicking_backend_falls_back_and_worker_survives() {
        let translator = Arc::new(PanicOnceTranslator::default());
        let service = TranslationService::new(translator.clone(), Arc::new(MemoryStore::new()), fast_config());

        let first = service.add_request(strings(&["a"]), "id").await;
        assert_eq!(first, vec!["a"]);
        assert_eq!(service.metrics().api_failures, 1);

        let second = tokio::time::timeout(
            Duration::from_secs(2),
            service.add_request(strings(&["b"]), "id"),
        )
        .await
        .expect("Queue should keep draining after a backend panic");
        assert_eq!(second, vec!["B"]);
        assert_eq!(service.pending_len(), 0);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shared_cache_is_used() {
        let cache = Arc::new(TranslationCache::new());
        cache.set("id", "Hello", "Halo");

        let translator = Arc::new(UpperTranslator::default());
        let service = TranslationService::with_cache(
            translator.clone(),
            Arc::new(MemoryStore::new()),
            cache,
            fast_config(),
        );

        assert_eq!(service.add_request(strings(&["Hello"]), "id").await, vec!["Halo"]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.metrics().memory_hits, 1);
    }
}
