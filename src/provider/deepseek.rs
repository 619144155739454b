//! DeepSeek adapter. The API is OpenAI-compatible, so the wire format
//! mirrors [`crate::provider::openai`] minus the reasoning-effort / vision
//! knobs OpenAI-proper exposes.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::openai::{classify_http_error, classify_reqwest_error};
use crate::provider::{guard_against_injection, looks_like_placeholder, LlmAdapter, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "deepseek-chat";
const API_URL: &str = "https://api.deepseek.com/chat/completions";

pub struct DeepSeekAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl DeepSeekAdapter {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

impl LlmAdapter for DeepSeekAdapter {
    fn propose_filename(&self, text: &str, _image: Option<&[u8]>) -> Result<String, ProviderError> {
        let (safe_text, injected) = guard_against_injection(text);
        if injected {
            tracing::warn!(provider = "deepseek", "prompt injection pattern detected in extracted text, substituting safe fallback prompt");
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
                Message { role: "user".to_string(), content: safe_text },
            ],
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| classify_reqwest_error(e, "deepseek"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body, "deepseek"));
        }

        let parsed: ChatResponse = response.json().map_err(|e| ProviderError::BadResponse {
            provider: "deepseek".to_string(),
            message: e.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| ProviderError::BadResponse {
                provider: "deepseek".to_string(),
                message: "no choices in response".to_string(),
            })
    }

    fn validate_credentials(&self) -> bool {
        !self.api_key.is_empty() && !looks_like_placeholder(&self.api_key)
    }

    fn name(&self) -> &str {
        "deepseek"
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        let adapter = DeepSeekAdapter::new("ds-key".to_string(), None);
        assert_eq!(adapter.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_credentials_rejects_placeholder() {
        let adapter = DeepSeekAdapter::new("changeme".to_string(), None);
        assert!(!adapter.validate_credentials());
    }

    #[test]
    fn test_validate_credentials_accepts_nonempty_key() {
        let adapter = DeepSeekAdapter::new("a-real-looking-key".to_string(), None);
        assert!(adapter.validate_credentials());
    }
}
