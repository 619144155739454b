use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::openai::{classify_http_error, classify_reqwest_error};
use crate::provider::{guard_against_injection, looks_like_placeholder, LlmAdapter, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GoogleAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl GoogleAdapter {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }
}

impl LlmAdapter for GoogleAdapter {
    fn propose_filename(&self, text: &str, _image: Option<&[u8]>) -> Result<String, ProviderError> {
        let (safe_text, injected) = guard_against_injection(text);
        if injected {
            tracing::warn!(provider = "google", "prompt injection pattern detected in extracted text, substituting safe fallback prompt");
        }
        let prompt = format!("{SYSTEM_PROMPT}\n\nDocument text:\n{safe_text}");

        let request = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig { max_output_tokens: MAX_OUTPUT_TOKENS },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .map_err(|e| classify_reqwest_error(e, "google"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body, "google"));
        }

        let parsed: GenerateResponse = response.json().map_err(|e| ProviderError::BadResponse {
            provider: "google".to_string(),
            message: e.to_string(),
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| ProviderError::BadResponse {
                provider: "google".to_string(),
                message: "no candidates in response".to_string(),
            })
    }

    fn validate_credentials(&self) -> bool {
        !self.api_key.is_empty() && !looks_like_placeholder(&self.api_key) && self.api_key.starts_with("AIza")
    }

    fn name(&self) -> &str {
        "google"
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials_requires_aiza_prefix() {
        let adapter = GoogleAdapter::new("not-a-key".to_string(), None);
        assert!(!adapter.validate_credentials());

        let adapter = GoogleAdapter::new("AIzaSyRealLookingKeyValue1234".to_string(), None);
        assert!(adapter.validate_credentials());
    }

    #[test]
    fn test_endpoint_uses_configured_model() {
        let adapter = GoogleAdapter::new("AIzaX".to_string(), Some("gemini-1.5-pro".to_string()));
        assert!(adapter.endpoint().contains("gemini-1.5-pro"));
    }

    #[test]
    fn test_default_model() {
        let adapter = GoogleAdapter::new("AIzaX".to_string(), None);
        assert_eq!(adapter.model, DEFAULT_MODEL);
    }
}
