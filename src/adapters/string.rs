use crate::queue::TranslationService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Texts collected for one language while its window is open.
///
/// Created on first use, removed by the flush that sends it.
struct PendingBuffer {
    texts: Vec<String>,
    index: HashMap<String, usize>,
    waiters: Vec<(usize, oneshot::Sender<String>)>,
    /// Identifies the timer allowed to flush this buffer
    generation: u64,
    timer: Option<JoinHandle<()>>,
    opened_at: Instant,
}

impl PendingBuffer {
    fn new(opened_at: Instant) -> Self {
        Self {
            texts: Vec::new(),
            index: HashMap::new(),
            waiters: Vec::new(),
            generation: 0,
            timer: None,
            opened_at,
        }
    }

    /// Add a text (deduplicated) and return its position
    fn push(&mut self, text: &str) -> usize {
        if let Some(&i) = self.index.get(text) {
            return i;
        }
        let i = self.texts.len();
        self.index.insert(text.to_string(), i);
        self.texts.push(text.to_string());
        i
    }
}

type Buffers = Arc<Mutex<HashMap<String, PendingBuffer>>>;

const DEFAULT_MAX_WAIT_WINDOWS: u32 = 8;

/// Per-string adapter.
///
/// Individual strings requested for the same language within the debounce
/// window are merged into one `add_request`. Each new string restarts the
/// window for its language, so a steady stream of strings closer together
/// than `debounce` would never flush on its own. `max_wait` bounds that: a
/// window is flushed at most `max_wait` after it opened, however busy it is.
pub struct StringTranslator {
    service: Arc<TranslationService>,
    source_language: String,
    debounce: Duration,
    max_wait: Duration,
    buffers: Buffers,
    generations: AtomicU64,
}

impl StringTranslator {
    pub fn new(
        service: Arc<TranslationService>,
        source_language: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            service,
            source_language: source_language.into(),
            debounce,
            max_wait: debounce.saturating_mul(DEFAULT_MAX_WAIT_WINDOWS),
            buffers: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(1),
        }
    }

    /// Cap how long an open window may keep extending (default `8 × debounce`)
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait.max(self.debounce);
        self
    }

    /// Translate a single string, falling back to the input on any failure
    pub async fn translate(&self, text: &str, language: &str) -> String {
        if language == self.source_language || text.trim().is_empty() {
            return text.to_string();
        }

        if let Some(hit) = self.service.cache().get(language, text) {
            return hit;
        }

        let receiver = self.join_window(text, language);
        receiver.await.unwrap_or_else(|_| text.to_string())
    }

    /// Number of languages with an open window
    pub fn open_windows(&self) -> usize {
        self.buffers.lock().len()
    }

    fn join_window(&self, text: &str, language: &str) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let mut buffers = self.buffers.lock();
        let buffer = buffers
            .entry(language.to_string())
            .or_insert_with(|| PendingBuffer::new(now));

        let deadline = buffer.opened_at + self.max_wait;
        let delay = self.debounce.min(deadline.saturating_duration_since(now));

        let position = buffer.push(text);
        buffer.waiters.push((position, tx));

        if let Some(timer) = buffer.timer.take() {
            timer.abort();
        }
        buffer.generation = generation;
        buffer.timer = Some(tokio::spawn(flush_after(
            Arc::clone(&self.service),
            Arc::clone(&self.buffers),
            language.to_string(),
            generation,
            delay,
        )));

        rx
    }
}

async fn flush_after(
    service: Arc<TranslationService>,
    buffers: Buffers,
    language: String,
    generation: u64,
    delay: Duration,
) {
    sleep(delay).await;

    let buffer = {
        let mut buffers = buffers.lock();
        match buffers.get(&language) {
            Some(buffer) if buffer.generation == generation => buffers.remove(&language),
            // A newer string restarted the window
            _ => None,
        }
    };
    let Some(buffer) = buffer else {
        return;
    };

    debug!(
        "Flushing {} string(s) for {} ({} waiter(s))",
        buffer.texts.len(),
        language,
        buffer.waiters.len()
    );

    let results = service.add_request(buffer.texts.clone(), &language).await;
    for (position, waiter) in buffer.waiters {
        let value = results
            .get(position)
            .cloned()
            .unwrap_or_else(|| buffer.texts[position].clone());
        let _ = waiter.send(value);
    }
}
