use std::time::Duration;

/// Errors returned by a translation backend.
///
/// The queue only cares about one distinction: whether the backend asked us
/// to slow down (`is_rate_limited`) or failed for any other reason.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translation API rate limit exceeded")]
    RateLimited,

    #[error("translation API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to reach translation API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed translation response: {0}")]
    InvalidResponse(String),

    #[error("translation API call timed out after {0:?}")]
    Timeout(Duration),

    #[error("translation backend panicked: {0}")]
    Panicked(String),
}

impl TranslateError {
    /// Rate-limit errors are retried with backoff, everything else falls back
    /// to the original text.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            TranslateError::RateLimited => true,
            TranslateError::Api { status, body } => *status == 429 || mentions_rate_limit(body),
            _ => false,
        }
    }
}

/// Check whether an error message carries a rate-limit signal
pub fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("too many requests")
}

/// Errors returned by a persistent translation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_variant_is_rate_limited() {
        assert!(TranslateError::RateLimited.is_rate_limited());
    }

    #[test]
    fn test_api_429_is_rate_limited() {
        let error = TranslateError::Api {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(error.is_rate_limited());
    }

    #[test]
    fn test_api_error_mentioning_rate_limit_is_rate_limited() {
        let error = TranslateError::Api {
            status: 500,
            body: r#"{"error": "Rate limit reached for requests"}"#.to_string(),
        };
        assert!(error.is_rate_limited());
    }

    #[test]
    fn test_api_500_is_not_rate_limited() {
        let error = TranslateError::Api {
            status: 500,
            body: "Internal Server Error".to_string(),
        };
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn test_timeout_and_panic_are_not_rate_limited() {
        assert!(!TranslateError::Timeout(Duration::from_secs(30)).is_rate_limited());
        assert!(!TranslateError::Panicked("boom".to_string()).is_rate_limited());
    }

    #[test]
    fn test_invalid_response_is_not_rate_limited() {
        let error = TranslateError::InvalidResponse("expected 2 translations, got 1".to_string());
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn test_mentions_rate_limit_variants() {
        assert!(mentions_rate_limit("RATE LIMIT exceeded"));
        assert!(mentions_rate_limit("code: rate_limit_exceeded"));
        assert!(mentions_rate_limit("429 Too Many Requests"));
        assert!(!mentions_rate_limit("quota ok"));
        assert!(!mentions_rate_limit(""));
    }

    #[test]
    fn test_error_display_includes_status() {
        let error = TranslateError::Api {
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("Service Unavailable"));
    }
}
