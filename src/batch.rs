//! Batch assembly for the queue worker.
//!
//! A cycle takes every pending request that shares the first request's
//! language, flattens their unresolved texts into one deduplicated list capped
//! at the batch size, and afterwards hands each request back its own slice of
//! the results in its original order.
//!
//! ```text
//! request A: [Hello, Save]          texts sent: [Hello, Save, Cancel]
//! request B: [Save, Cancel]   ==>   A -> [Sent(0), Sent(1)]
//!                                   B -> [Sent(1), Sent(2)]
//! ```

use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

/// One caller's pending work.
///
/// `translated` holds results for the prefix `texts[..translated.len()]`.
/// A request that overflowed the batch cap keeps its partial progress and is
/// requeued for the next cycle.
#[derive(Debug)]
pub struct QueuedRequest {
    pub language: String,
    texts: Vec<String>,
    translated: Vec<String>,
    responder: oneshot::Sender<Vec<String>>,
}

impl QueuedRequest {
    /// Create a request and the receiver its caller awaits
    pub fn new(texts: Vec<String>, language: &str) -> (Self, oneshot::Receiver<Vec<String>>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            language: language.to_string(),
            translated: Vec::with_capacity(texts.len()),
            texts,
            responder: tx,
        };
        (request, rx)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Texts that still need a translation
    pub fn remaining(&self) -> &[String] {
        &self.texts[self.translated.len()..]
    }

    pub fn is_complete(&self) -> bool {
        self.translated.len() == self.texts.len()
    }

    /// Deliver results, substituting the original text for anything unresolved.
    ///
    /// A caller that stopped waiting has dropped its receiver; that is not an error.
    pub fn resolve(mut self) {
        let done = self.translated.len();
        self.translated.extend(self.texts[done..].iter().cloned());
        let _ = self.responder.send(self.translated);
    }
}

/// Remove and return every pending request in the first request's language.
///
/// Requests in other languages keep their relative order.
pub fn take_same_language(pending: &mut VecDeque<QueuedRequest>) -> Vec<QueuedRequest> {
    let Some(language) = pending.front().map(|r| r.language.clone()) else {
        return Vec::new();
    };

    let mut selected = Vec::new();
    let mut rest = VecDeque::with_capacity(pending.len());
    for request in pending.drain(..) {
        if request.language == language {
            selected.push(request);
        } else {
            rest.push_back(request);
        }
    }
    *pending = rest;
    selected
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Already known, no need to send
    Cached(String),
    /// Index into the outbound text list
    Sent(usize),
}

/// The outbound text list for one API call plus the mapping back to requests.
#[derive(Debug)]
pub struct BatchPlan {
    texts: Vec<String>,
    slots: Vec<Vec<Slot>>,
}

impl BatchPlan {
    /// Plan one cycle for `requests` (all the same language).
    ///
    /// `lookup` is consulted first for every text so that anything resolved
    /// since the request was queued is not sent again.
    pub fn build<F>(requests: &[QueuedRequest], max_batch_size: usize, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut texts: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(requests.len());

        for request in requests {
            let mut request_slots = Vec::new();
            for text in request.remaining() {
                if let Some(hit) = lookup(text) {
                    request_slots.push(Slot::Cached(hit));
                } else if let Some(&i) = index.get(text) {
                    request_slots.push(Slot::Sent(i));
                } else if texts.len() < max_batch_size {
                    index.insert(text.clone(), texts.len());
                    request_slots.push(Slot::Sent(texts.len()));
                    texts.push(text.clone());
                } else {
                    // Over the cap: the rest of this request waits for the next cycle
                    break;
                }
            }
            slots.push(request_slots);
        }

        Self { texts, slots }
    }

    /// Unique texts to send to the API
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Number of texts planned this cycle for the request at `index`
    pub fn planned(&self, index: usize) -> usize {
        self.slots.get(index).map_or(0, Vec::len)
    }

    /// Record results on each request.
    ///
    /// With `None` (failed call) every sent text resolves to its original.
    pub fn apply(&self, requests: &mut [QueuedRequest], translations: Option<&[String]>) {
        for (request, slots) in requests.iter_mut().zip(&self.slots) {
            for slot in slots {
                let value = match slot {
                    Slot::Cached(hit) => hit.clone(),
                    Slot::Sent(i) => translations
                        .and_then(|t| t.get(*i))
                        .unwrap_or(&self.texts[*i])
                        .clone(),
                };
                request.translated.push(value);
            }
        }
    }
}
