//! Local adapter: talks to a localhost inference daemon (e.g. Ollama)
//! speaking the OpenAI chat-completions shape. No credential to validate;
//! instead it checks the daemon is reachable and the model is pulled.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::openai::{classify_http_error, classify_reqwest_error};
use crate::provider::{guard_against_injection, LlmAdapter, SYSTEM_PROMPT};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct LocalAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl LocalAdapter {
    pub fn new(model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
        }
    }

    fn daemon_reachable(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_available(&self) -> bool {
        let response = match self.client.get(format!("{}/api/tags", self.base_url)).send() {
            Ok(r) => r,
            Err(_) => return false,
        };
        let body: TagsResponse = match response.json() {
            Ok(b) => b,
            Err(_) => return false,
        };
        body.models.iter().any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model)))
    }
}

impl LlmAdapter for LocalAdapter {
    fn propose_filename(&self, text: &str, _image: Option<&[u8]>) -> Result<String, ProviderError> {
        let (safe_text, injected) = guard_against_injection(text);
        if injected {
            tracing::warn!(provider = "local", "prompt injection pattern detected in extracted text, substituting safe fallback prompt");
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: format!("{SYSTEM_PROMPT}\n\nDocument text:\n{safe_text}"),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .map_err(|e| classify_reqwest_error(e, "local"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body, "local"));
        }

        let parsed: GenerateResponse = response.json().map_err(|e| ProviderError::BadResponse {
            provider: "local".to_string(),
            message: e.to_string(),
        })?;

        Ok(parsed.response.trim().to_string())
    }

    fn validate_credentials(&self) -> bool {
        self.daemon_reachable() && self.model_available()
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize, Default)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let adapter = LocalAdapter::new("llama3".to_string(), None);
        assert_eq!(adapter.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_custom_base_url() {
        let adapter = LocalAdapter::new("llama3".to_string(), Some("http://localhost:9999".to_string()));
        assert_eq!(adapter.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_validate_credentials_false_when_unreachable() {
        let adapter = LocalAdapter::new("llama3".to_string(), Some("http://127.0.0.1:1".to_string()));
        assert!(!adapter.validate_credentials());
    }
}
