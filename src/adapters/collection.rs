use crate::queue::TranslationService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-collection adapter.
///
/// Translates the named string fields of every record with at most one
/// `add_request` for the whole collection. Inputs are never mutated; a new
/// list is returned.
pub struct CollectionTranslator {
    service: Arc<TranslationService>,
    source_language: String,
}

impl CollectionTranslator {
    pub fn new(service: Arc<TranslationService>, source_language: impl Into<String>) -> Self {
        Self {
            service,
            source_language: source_language.into(),
        }
    }

    /// Translate `fields` of each JSON object in `records`.
    ///
    /// Non-object records, missing fields, non-string values and blank strings
    /// are passed through untouched.
    pub async fn translate(&self, records: &[Value], fields: &[&str], language: &str) -> Vec<Value> {
        if language == self.source_language || fields.is_empty() || records.is_empty() {
            return records.to_vec();
        }

        let cache = self.service.cache();
        let mut output = records.to_vec();
        let mut misses: Vec<(usize, &str, String)> = Vec::new();

        for (i, record) in output.iter_mut().enumerate() {
            let Some(object) = record.as_object_mut() else {
                continue;
            };
            for &field in fields {
                let Some(Value::String(text)) = object.get(field) else {
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }
                match cache.get(language, text) {
                    Some(hit) => {
                        object.insert(field.to_string(), Value::String(hit));
                    }
                    None => misses.push((i, field, text.clone())),
                }
            }
        }

        if misses.is_empty() {
            return output;
        }

        let mut unique: Vec<String> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (_, _, text) in &misses {
            if !position.contains_key(text.as_str()) {
                position.insert(text.as_str(), unique.len());
                unique.push(text.clone());
            }
        }

        let translated = self.service.add_request(unique, language).await;

        for (i, field, text) in &misses {
            let value = position
                .get(text.as_str())
                .and_then(|&p| translated.get(p))
                .cloned()
                .unwrap_or_else(|| text.clone());
            if let Some(object) = output[*i].as_object_mut() {
                object.insert(field.to_string(), Value::String(value));
            }
        }

        output
    }

    /// Typed wrapper over [`translate`](Self::translate).
    ///
    /// Records round-trip through `serde_json`; if that fails for any record
    /// the originals are returned unchanged.
    pub async fn translate_typed<T>(&self, records: &[T], fields: &[&str], language: &str) -> Vec<T>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        if language == self.source_language {
            return records.to_vec();
        }

        let values: Result<Vec<Value>, _> = records.iter().map(serde_json::to_value).collect();
        let Ok(values) = values else {
            return records.to_vec();
        };

        let translated = self.translate(&values, fields, language).await;
        translated
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .unwrap_or_else(|_| records.to_vec())
    }
}
