/// Completion providers for LLM nodes
///
/// The engine receives a ready `CompletionProvider` at construction; it never
/// builds HTTP clients itself. `AnthropicProvider` talks to the Messages API,
/// `UnconfiguredProvider` stands in when no API key is set.

use crate::config::LlmConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Text returned by LLM nodes when no provider is configured
pub const UNCONFIGURED_REPLY: &str =
    "[LLM provider not configured - set ANTHROPIC_API_KEY to enable AI features]";

/// Default system prompt for LLM nodes
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Model alias as written on the node (e.g. "claude-4-sonnet")
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system: String,
}

/// Capability used by LLM nodes to turn a prompt into text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Map a model alias to the provider's model id
///
/// Unknown aliases fall back to `default_alias`, and an unknown default falls
/// back to the current sonnet model.
pub fn resolve_model(alias: &str, default_alias: &str) -> &'static str {
    fn lookup(alias: &str) -> Option<&'static str> {
        match alias {
            "claude-4-opus" => Some("claude-opus-4-20250514"),
            "claude-4-sonnet" => Some("claude-sonnet-4-20250514"),
            "claude-4-haiku" => Some("claude-3-5-haiku-20241022"),
            "claude-3-opus" => Some("claude-3-opus-20240229"),
            "claude-3-sonnet" => Some("claude-3-sonnet-20240229"),
            "claude-3-haiku" => Some("claude-3-haiku-20240307"),
            _ => None,
        }
    }

    lookup(alias)
        .or_else(|| lookup(default_alias))
        .unwrap_or("claude-sonnet-4-20250514")
}

// Anthropic Messages API wire types
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client
#[derive(Clone)]
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let model_id = resolve_model(&request.model, &self.default_model);
        tracing::debug!("🤖 Calling {} ({} max tokens)", model_id, request.max_tokens);

        let body = MessagesRequest {
            model: model_id,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            anyhow::bail!("Completion provider returned HTTP {}: {}", status, detail);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Malformed completion response")?;

        Ok(parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default())
    }
}

/// Provider used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl CompletionProvider for UnconfiguredProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        Ok(UNCONFIGURED_REPLY.to_string())
    }
}

/// Pick the provider for the given settings
pub fn provider_from_config(config: &LlmConfig) -> Arc<dyn CompletionProvider> {
    match &config.api_key {
        Some(api_key) => {
            tracing::info!("🤖 Completion provider: Anthropic ({})", config.default_model);
            Arc::new(AnthropicProvider::new(
                api_key.clone(),
                config.api_url.clone(),
                config.default_model.clone(),
            ))
        }
        None => {
            tracing::warn!("⚠️ ANTHROPIC_API_KEY not set, LLM nodes will return a placeholder reply");
            Arc::new(UnconfiguredProvider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_with_default_fallback() {
        assert_eq!(resolve_model("claude-4-opus", "claude-4-sonnet"), "claude-opus-4-20250514");
        assert_eq!(resolve_model("gpt-5", "claude-3-haiku"), "claude-3-haiku-20240307");
        assert_eq!(resolve_model("", "nonsense"), "claude-sonnet-4-20250514");
    }

    #[tokio::test]
    async fn unconfigured_provider_returns_placeholder() {
        let reply = UnconfiguredProvider
            .complete(CompletionRequest {
                prompt: "hi".to_string(),
                model: "claude-4-sonnet".to_string(),
                temperature: 0.7,
                max_tokens: 16,
                system: DEFAULT_SYSTEM_PROMPT.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(reply, UNCONFIGURED_REPLY);
    }
}
