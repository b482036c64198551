//! LLM completion providers tried by the recommendation chain.
//!
//! Each provider turns a prompt into raw completion text. Failures are
//! returned as [`ProviderError`] values; the chain decides what to do next.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ProviderConfig, ProviderKind};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_COMPLETION_TOKENS: u32 = 1_024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("no credential configured")]
    MissingCredential,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout(timeout)
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fixed confidence reported when this provider's answer is used.
    fn confidence(&self) -> f32;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Build providers in the configured priority order. Providers without a
/// credential are kept; they fail fast with [`ProviderError::MissingCredential`].
pub fn from_config(
    client: &reqwest::Client,
    configs: &[ProviderConfig],
) -> Vec<Arc<dyn CompletionProvider>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn CompletionProvider> {
            match config.kind {
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client.clone(), config.clone())),
                ProviderKind::Anthropic => {
                    Arc::new(AnthropicProvider::new(client.clone(), config.clone()))
                }
                ProviderKind::Ollama => Arc::new(OllamaProvider::new(client.clone(), config.clone())),
            }
        })
        .collect()
}

fn credential(config: &ProviderConfig) -> Result<&str, ProviderError> {
    if !config.enabled {
        return Err(ProviderError::MissingCredential);
    }
    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ProviderError::MissingCredential)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

// ─── OpenAI-compatible ───────────────────────────────────

pub struct OpenAiProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn confidence(&self) -> f32 {
        self.config.confidence
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = credential(&self.config)?;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let req = OpenAiChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        let body: OpenAiChatResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("empty completion".to_string()))
    }
}

// ─── Anthropic ───────────────────────────────────────────

pub struct AnthropicProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn confidence(&self) -> f32 {
        self.config.confidence
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = credential(&self.config)?;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| ProviderError::MissingCredential)?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let req = AnthropicRequest {
            model: &self.config.model,
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: self.config.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        let body: AnthropicResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(ProviderError::Malformed(
                "response missing text content".to_string(),
            ));
        }
        Ok(text)
    }
}

// ─── Ollama ──────────────────────────────────────────────

/// Local Ollama server. It needs no API key; it counts as configured once a
/// base URL has been set explicitly.
pub struct OllamaProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OllamaProvider {
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn confidence(&self) -> f32 {
        self.config.confidence
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::MissingCredential);
        }
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));

        let req = OllamaChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        let body: OllamaChatResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;

        body.message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig::defaults()
            .into_iter()
            .find(|p| p.kind == kind)
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_network() {
        let providers = from_config(&reqwest::Client::new(), &ProviderConfig::defaults());
        assert_eq!(providers.len(), 3);
        for provider in providers {
            assert_eq!(
                provider.complete("hi").await,
                Err(ProviderError::MissingCredential),
                "{}",
                provider.name()
            );
        }
    }

    #[tokio::test]
    async fn test_blank_api_key_counts_as_missing() {
        let mut config = disabled(ProviderKind::OpenAi);
        config.enabled = true;
        config.api_key = Some("   ".to_string());
        let provider = OpenAiProvider::new(reqwest::Client::new(), config);
        assert_eq!(
            provider.complete("hi").await,
            Err(ProviderError::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let mut config = disabled(ProviderKind::Ollama);
        config.enabled = true;
        config.base_url = "http://127.0.0.1:9".to_string();
        config.timeout_secs = 2;
        let provider = OllamaProvider::new(reqwest::Client::new(), config);
        assert!(matches!(
            provider.complete("hi").await,
            Err(ProviderError::Transport(_)) | Err(ProviderError::Timeout(_))
        ));
    }

    #[test]
    fn test_anthropic_response_ignores_non_text_blocks() {
        let body: AnthropicResponse = serde_json::from_str(
            r#"{"content": [{"type": "tool_use", "id": "x"}, {"type": "text", "text": "{}"}]}"#,
        )
        .unwrap();
        assert_eq!(body.content.len(), 2);
        assert!(matches!(body.content[1], AnthropicBlock::Text { .. }));
    }

    #[test]
    fn test_provider_names_and_confidence() {
        let providers = from_config(&reqwest::Client::new(), &ProviderConfig::defaults());
        let summary: Vec<_> = providers
            .iter()
            .map(|p| (p.name().to_string(), p.confidence()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("openai".to_string(), 0.8),
                ("anthropic".to_string(), 0.75),
                ("ollama".to_string(), 0.7)
            ]
        );
    }
}
