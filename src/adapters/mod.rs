//! UI-facing helpers that turn ad-hoc translation needs into
//! [`TranslationService::add_request`](crate::queue::TranslationService::add_request) calls.
//!
//! - `StringTranslator`: one string at a time, coalesced per language over a short window
//! - `CollectionTranslator`: several fields across many records in one call

mod collection;
mod string;

pub use collection::CollectionTranslator;
pub use string::StringTranslator;
