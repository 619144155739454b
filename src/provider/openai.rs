use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{guard_against_injection, looks_like_placeholder, LlmAdapter, MAX_OUTPUT_TOKENS, SYSTEM_PROMPT};

const DEFAULT_MODEL: &str = "gpt-5-mini";
const API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Models whose reasoning effort is set via `reasoning_effort` rather than
/// `temperature`/`top_p`.
const REASONING_MODEL_PREFIXES: &[&str] = &["gpt-5", "o1", "o3"];

pub struct OpenAiAdapter {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn is_reasoning_model(&self) -> bool {
        REASONING_MODEL_PREFIXES
            .iter()
            .any(|prefix| self.model.starts_with(prefix))
    }

    fn build_request(&self, text: &str, image: Option<&[u8]>, vision_capable: bool) -> ChatRequest {
        let mut content = vec![ContentPart::Text { text: text.to_string() }];
        if vision_capable {
            if let Some(image) = image {
                let encoded = base64::engine::general_purpose::STANDARD.encode(image);
                content.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/png;base64,{encoded}"),
                    },
                });
            }
        }

        let mut request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message { role: "system".to_string(), content: vec![ContentPart::Text { text: SYSTEM_PROMPT.to_string() }] },
                Message { role: "user".to_string(), content },
            ],
            max_completion_tokens: MAX_OUTPUT_TOKENS,
            temperature: None,
            top_p: None,
            reasoning_effort: None,
        };

        if self.is_reasoning_model() {
            request.reasoning_effort = Some("low".to_string());
        } else {
            request.temperature = Some(0.1);
            request.top_p = Some(0.9);
        }

        request
    }

    fn send(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(|e| classify_reqwest_error(e, "openai"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body, "openai"));
        }

        let parsed: ChatResponse = response.json().map_err(|e| ProviderError::BadResponse {
            provider: "openai".to_string(),
            message: e.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content_text())
            .ok_or_else(|| ProviderError::BadResponse {
                provider: "openai".to_string(),
                message: "no choices in response".to_string(),
            })
    }
}

impl LlmAdapter for OpenAiAdapter {
    fn propose_filename(&self, text: &str, image: Option<&[u8]>) -> Result<String, ProviderError> {
        let (safe_text, injected) = guard_against_injection(text);
        if injected {
            tracing::warn!(provider = "openai", "prompt injection pattern detected in extracted text, substituting safe fallback prompt");
        }

        let request = self.build_request(&safe_text, image, true);
        match self.send(&request) {
            Ok(name) => Ok(name),
            Err(ProviderError::Unsupported { .. }) | Err(ProviderError::BadResponse { .. })
                if image.is_some() =>
            {
                // Retry text-only: some models reject vision content unexpectedly.
                let fallback = self.build_request(&safe_text, None, false);
                self.send(&fallback)
            }
            Err(e) => Err(e),
        }
    }

    fn validate_credentials(&self) -> bool {
        !self.api_key.is_empty() && !looks_like_placeholder(&self.api_key) && self.api_key.starts_with("sk-")
    }

    fn name(&self) -> &str {
        "openai"
    }
}

pub(crate) fn classify_reqwest_error(e: reqwest::Error, provider: &str) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { provider: provider.to_string() }
    } else {
        ProviderError::Network { provider: provider.to_string(), message: e.to_string() }
    }
}

pub(crate) fn classify_http_error(status: u16, body: &str, provider: &str) -> ProviderError {
    let lowered = body.to_lowercase();
    let is_content_policy = ["content_policy", "content management policy", "safety system", "content filter"]
        .iter()
        .any(|m| lowered.contains(m));

    match status {
        401 | 403 => ProviderError::Auth { provider: provider.to_string(), message: body.to_string() },
        400 if is_content_policy => ProviderError::ContentPolicy { provider: provider.to_string() },
        429 => ProviderError::RateLimit { provider: provider.to_string() },
        500..=599 => ProviderError::ServerError { provider: provider.to_string(), status },
        _ => ProviderError::BadResponse { provider: provider.to_string(), message: body.to_string() },
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
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
    content: Option<String>,
}

impl ResponseMessage {
    fn content_text(&self) -> String {
        self.content.clone().unwrap_or_default().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_credentials_requires_sk_prefix() {
        let adapter = OpenAiAdapter::new("not-a-key".to_string(), None);
        assert!(!adapter.validate_credentials());

        let adapter = OpenAiAdapter::new("sk-realkeylookingvalue123456".to_string(), None);
        assert!(adapter.validate_credentials());
    }

    #[test]
    fn test_validate_credentials_rejects_placeholder() {
        let adapter = OpenAiAdapter::new("sk-xxxxxxxxxxxxxxxxxxxxxxxx".to_string(), None);
        assert!(!adapter.validate_credentials());
    }

    #[test]
    fn test_default_model_used_when_none_given() {
        let adapter = OpenAiAdapter::new("sk-test".to_string(), None);
        assert_eq!(adapter.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_reasoning_model_detection() {
        let adapter = OpenAiAdapter::new("sk-test".to_string(), Some("gpt-5-mini".to_string()));
        assert!(adapter.is_reasoning_model());

        let adapter = OpenAiAdapter::new("sk-test".to_string(), Some("gpt-4o".to_string()));
        assert!(!adapter.is_reasoning_model());
    }

    #[test]
    fn test_classify_http_error_rate_limit() {
        let err = classify_http_error(429, "too many requests", "openai");
        assert!(matches!(err, ProviderError::RateLimit { .. }));
    }

    #[test]
    fn test_classify_http_error_server_error() {
        let err = classify_http_error(503, "unavailable", "openai");
        assert!(matches!(err, ProviderError::ServerError { status: 503, .. }));
    }

    #[test]
    fn test_classify_http_error_content_policy() {
        let err = classify_http_error(400, "Your request was rejected by our content management policy", "openai");
        assert!(matches!(err, ProviderError::ContentPolicy { .. }));
    }

    #[test]
    fn test_classify_http_error_plain_bad_request_is_bad_response() {
        let err = classify_http_error(400, "missing required field", "openai");
        assert!(matches!(err, ProviderError::BadResponse { .. }));
    }
}
