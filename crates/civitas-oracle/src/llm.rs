//! LLM backend abstraction and implementations.
//!
//! Enum dispatch over the two wire formats in use: `OpenAI`-compatible chat
//! completions (`DeepSeek`, `OpenAI`, `StepFun`) and the Anthropic Messages
//! API. All backends communicate over HTTP via `reqwest`.
//!
//! The oracle does not care which model is behind the API. It sends a
//! prompt and expects a text response containing JSON.

use reqwest::StatusCode;

use crate::config::{ProviderConfig, ProviderKind, WireFormat};
use crate::error::LlmError;
use crate::prompt::RenderedPrompt;

/// Sampling temperature for every request.
const TEMPERATURE: f64 = 0.7;

/// Response token budget for every request.
const MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend that can process a prompt and return a response.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt to the LLM and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Unauthorized`] on 401, [`LlmError::RateLimited`]
    /// on 429, [`LlmError::Status`] on any other failure status, and
    /// [`LlmError::Transport`] if the request never completed.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// The provider behind this backend.
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::OpenAi(backend) => backend.kind,
            Self::Anthropic(backend) => backend.kind,
        }
    }
}

/// Turn a failure status into the matching error.
async fn status_error(provider: ProviderKind, response: reqwest::Response) -> LlmError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => LlmError::Unauthorized {
            provider: provider.name().to_owned(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: provider.name().to_owned(),
            retry_after_ms: 0,
        },
        _ => LlmError::Status {
            provider: provider.name().to_owned(),
            status: status.as_u16(),
            body: response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned()),
        },
    }
}

/// HTTP client for a provider. Loopback endpoints, such as a model served
/// on the same machine, bypass any configured proxy.
fn http_client(api_url: &str) -> reqwest::Client {
    let loopback = reqwest::Url::parse(api_url)
        .ok()
        .and_then(|url| url.host_str().map(ToOwned::to_owned))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"));
    let builder = reqwest::Client::builder();
    let builder = if loopback { builder.no_proxy() } else { builder };
    builder.build().unwrap_or_default()
}

fn transport_error(provider: ProviderKind, err: &reqwest::Error) -> LlmError {
    LlmError::Transport {
        provider: provider.name().to_owned(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    kind: ProviderKind,
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            kind: config.kind,
            client: http_client(&config.api_url),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.kind, &e))?;

        if !response.status().is_success() {
            return Err(status_error(self.kind, response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_error(self.kind, &e))?;

        extract_openai_content(self.kind, &json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(
    provider: ProviderKind,
    json: &serde_json::Value,
) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| LlmError::MissingContent {
            provider: provider.name().to_owned(),
            field: "choices[0].message.content",
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from `OpenAI`:
/// - Uses `x-api-key` header instead of `Authorization: Bearer`
/// - Messages array does not include system (system is a top-level field)
/// - Response structure differs: `content[0].text`
pub struct AnthropicBackend {
    kind: ProviderKind,
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            kind: config.kind,
            client: http_client(&config.api_url),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.kind, &e))?;

        if !response.status().is_success() {
            return Err(status_error(self.kind, response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_error(self.kind, &e))?;

        extract_anthropic_content(self.kind, &json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(
    provider: ProviderKind,
    json: &serde_json::Value,
) -> Result<String, LlmError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| LlmError::MissingContent {
            provider: provider.name().to_owned(),
            field: "content[0].text",
        })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend for a provider.
pub fn create_backend(config: &ProviderConfig) -> LlmBackend {
    match config.kind.wire_format() {
        WireFormat::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        WireFormat::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_url: kind.default_api_url().to_owned(),
            api_key: "test".to_owned(),
            model: kind.default_model().to_owned(),
        }
    }

    #[test]
    fn extract_openai_content_valid() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "{\"action\": \"rest\"}"
                }
            }]
        });
        let result = extract_openai_content(ProviderKind::DeepSeek, &json);
        assert!(result.is_ok());
        assert!(result.unwrap_or_default().contains("rest"));
    }

    #[test]
    fn extract_openai_content_missing_choices() {
        let json = serde_json::json!({"error": "rate_limit"});
        let result = extract_openai_content(ProviderKind::OpenAi, &json);
        assert!(matches!(result, Err(LlmError::MissingContent { .. })));
    }

    #[test]
    fn extract_anthropic_content_valid() {
        let json = serde_json::json!({
            "content": [{
                "type": "text",
                "text": "{\"action\": \"eat\"}"
            }]
        });
        let result = extract_anthropic_content(ProviderKind::Anthropic, &json);
        assert!(result.is_ok());
        assert!(result.unwrap_or_default().contains("eat"));
    }

    #[test]
    fn extract_anthropic_content_missing() {
        let json = serde_json::json!({"content": []});
        let result = extract_anthropic_content(ProviderKind::Anthropic, &json);
        assert!(result.is_err());
    }

    #[test]
    fn create_backend_dispatches_on_wire_format() {
        let backend = create_backend(&make_config(ProviderKind::Step));
        assert!(matches!(backend, LlmBackend::OpenAi(_)));
        assert_eq!(backend.provider(), ProviderKind::Step);

        let backend = create_backend(&make_config(ProviderKind::Anthropic));
        assert!(matches!(backend, LlmBackend::Anthropic(_)));
        assert_eq!(backend.provider(), ProviderKind::Anthropic);
    }
}
