//! Anthropic adapter. Grounded in the reference provider's key-format check
//! and its per-model quirk of omitting `temperature` for certain newer
//! model families.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::openai::{classify_http_error, classify_reqwest_error};
use crate::provider::{guard_against_injection, looks_like_placeholder, LlmAdapter, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "claude-3.5-haiku";
const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Model families that reject an explicit `temperature` parameter.
const NO_TEMPERATURE_MODELS: &[&str] = &["claude-opus-4", "opus-4.1"];

pub struct AnthropicAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn omits_temperature(&self) -> bool {
        NO_TEMPERATURE_MODELS.iter().any(|m| self.model.contains(m))
    }
}

impl LlmAdapter for AnthropicAdapter {
    fn propose_filename(&self, text: &str, _image: Option<&[u8]>) -> Result<String, ProviderError> {
        let (safe_text, injected) = guard_against_injection(text);
        if injected {
            tracing::warn!(provider = "anthropic", "prompt injection pattern detected in extracted text, substituting safe fallback prompt");
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            system: SYSTEM_PROMPT.to_string(),
            temperature: if self.omits_temperature() { None } else { Some(0.2) },
            messages: vec![Message { role: "user".to_string(), content: safe_text }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .map_err(|e| classify_reqwest_error(e, "anthropic"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body, "anthropic"));
        }

        let parsed: MessagesResponse = response.json().map_err(|e| ProviderError::BadResponse {
            provider: "anthropic".to_string(),
            message: e.to_string(),
        })?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ProviderError::BadResponse {
                provider: "anthropic".to_string(),
                message: "no text content in response".to_string(),
            })
    }

    fn validate_credentials(&self) -> bool {
        !self.api_key.is_empty()
            && !looks_like_placeholder(&self.api_key)
            && self.api_key.starts_with("sk-ant-")
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials_requires_sk_ant_prefix() {
        let adapter = AnthropicAdapter::new("sk-not-anthropic".to_string(), None);
        assert!(!adapter.validate_credentials());

        let adapter = AnthropicAdapter::new("sk-ant-REDACTED".to_string(), None);
        assert!(adapter.validate_credentials());
    }

    #[test]
    fn test_omits_temperature_for_opus_4_1() {
        let adapter = AnthropicAdapter::new("sk-ant-x".to_string(), Some("claude-opus-4-1-20250805".to_string()));
        assert!(adapter.omits_temperature());
    }

    #[test]
    fn test_sets_temperature_for_haiku() {
        let adapter = AnthropicAdapter::new("sk-ant-x".to_string(), Some("claude-3.5-haiku".to_string()));
        assert!(!adapter.omits_temperature());
    }

    #[test]
    fn test_default_model() {
        let adapter = AnthropicAdapter::new("sk-ant-x".to_string(), None);
        assert_eq!(adapter.model, DEFAULT_MODEL);
    }
}
