//! Chat-completions translation backend.
//!
//! The whole batch goes out as a JSON array in one prompt and the model is
//! asked to answer with a JSON object `{"translations": [...]}` of the same
//! length.

use crate::error::{mentions_rate_limit, TranslateError};
use crate::translator::{check_count, Translator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    translations: Vec<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Build the system prompt for batch UI string translation
fn build_system_prompt(target_language: &str) -> String {
    format!(
        r#"You are a professional translator for website interface copy. Translate every string in the user's JSON array into the language with code "{}".

## Rules
- Return a JSON object of the form {{"translations": [...]}}
- The array must have exactly as many items as the input, in the same order
- Keep brand names, URLs, email addresses and placeholders like {{name}} unchanged
- Preserve leading/trailing whitespace, punctuation and capitalisation style
- If a string should not be translated, return it unchanged"#,
        target_language
    )
}

/// Build the user prompt carrying the strings to translate
fn build_user_prompt(texts: &[String]) -> Result<String, TranslateError> {
    serde_json::to_string(texts).map_err(|e| TranslateError::InvalidResponse(e.to_string()))
}

/// Translator backed by the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_request(&self, texts: &[String], target_language: &str) -> Result<ChatRequest, TranslateError> {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);
        let max_completion_tokens = if is_reasoning { 16000 } else { 4000 };

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(target_language),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(texts)?,
                },
            ],
            max_completion_tokens,
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
            response_format: ResponseFormat {
                kind: "json_object",
            },
        })
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
    ) -> Result<Vec<String>, TranslateError> {
        let request = self.build_request(texts, target_language)?;
        debug!("Sending {} texts to {} for {}", texts.len(), self.model, target_language);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            if status.as_u16() == 429 || mentions_rate_limit(&body) {
                return Err(TranslateError::RateLimited);
            }
            return Err(TranslateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TranslateError::InvalidResponse("response contained no choices".to_string()))?;

        let payload: TranslationPayload = serde_json::from_str(content.trim())
            .map_err(|e| TranslateError::InvalidResponse(format!("model output is not valid JSON: {}", e)))?;

        check_count(texts.len(), payload.translations)
    }
}
