use crate::error::{mentions_rate_limit, TranslateError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A batch translation backend.
///
/// Implementations must return exactly one translation per input text, in
/// input order. Rate-limit failures must surface as errors for which
/// [`TranslateError::is_rate_limited`] returns `true`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, TranslateError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    texts: &'a [String],
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    translations: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a JSON translation endpoint.
///
/// Sends `{"texts": [...], "targetLanguage": "id"}` and expects
/// `{"translations": [...]}` back. Some deployments report rate limiting as a
/// 200 or 500 with an `error` message, so the body is inspected as well as the
/// status code.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, TranslateError> {
        debug!("POST {} texts to {} ({})", texts.len(), self.url, target_language);

        let mut request = self.client.post(&self.url).json(&BatchRequest {
            texts,
            target_language,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(TranslateError::RateLimited);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: BatchResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            if mentions_rate_limit(&error) {
                return Err(TranslateError::RateLimited);
            }
            return Err(TranslateError::Api {
                status: status.as_u16(),
                body: error,
            });
        }

        let translations = body
            .translations
            .ok_or_else(|| TranslateError::InvalidResponse("missing translations".to_string()))?;

        check_count(texts.len(), translations)
    }
}

/// Reject responses that cannot be mapped back positionally
pub(crate) fn check_count(
    expected: usize,
    translations: Vec<String>,
) -> Result<Vec<String>, TranslateError> {
    if translations.len() != expected {
        return Err(TranslateError::InvalidResponse(format!(
            "expected {} translations, got {}",
            expected,
            translations.len()
        )));
    }
    Ok(translations)
}
