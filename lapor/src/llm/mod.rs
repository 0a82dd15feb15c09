//! Generation provider abstraction.
//!
//! One interface with swappable implementations chosen by configuration; the
//! rest of the crate never branches on a provider name.

mod anthropic;
mod ollama;
mod stub;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use stub::StubLlmProvider;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Errors from generation providers
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("provider response malformed: {0}")]
    Malformed(String),
    #[error("API key required for {0} provider")]
    MissingApiKey(&'static str),
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// One message of generation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Streamed reply chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Abstract interface for generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a reply for the given system prompt and conversation.
    /// The last message is the current user message.
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;

    /// Generate a reply as a stream of text chunks.
    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, LlmError>;

    /// Get provider information
    fn info(&self) -> ProviderInfo;
}

/// Information about a generation provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub model: String,
}

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// Deterministic responses, for tests and offline runs
    Stub,
    /// Local models served by Ollama
    Ollama,
    /// Anthropic Claude models
    Anthropic,
}

/// Configuration for generation providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmProviderConfig {
    pub provider_type: LlmProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: LlmProviderType::Ollama,
            model: "qwen2.5:3b-instruct".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(200),
            temperature: Some(0.7),
            timeout_seconds: Some(30),
        }
    }
}

/// Factory for creating generation providers
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider based on configuration.
    pub fn create(config: LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
        match config.provider_type {
            LlmProviderType::Stub => Ok(Arc::new(StubLlmProvider::new(config))),
            LlmProviderType::Ollama => Ok(Arc::new(OllamaProvider::new(config)?)),
            LlmProviderType::Anthropic => Ok(Arc::new(AnthropicProvider::new(config)?)),
        }
    }
}

pub(crate) fn build_http_client(timeout_seconds: Option<u64>) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds.unwrap_or(30)))
        .build()
        .map_err(|e| LlmError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_by_configuration() {
        let stub = LlmProviderFactory::create(LlmProviderConfig {
            provider_type: LlmProviderType::Stub,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stub.info().name, "stub");

        let ollama = LlmProviderFactory::create(LlmProviderConfig::default()).unwrap();
        assert_eq!(ollama.info().name, "ollama");

        let anthropic = LlmProviderFactory::create(LlmProviderConfig {
            provider_type: LlmProviderType::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            api_key: Some("key".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(anthropic.info().name, "anthropic");
    }

    #[test]
    fn provider_type_deserializes_from_lowercase() {
        assert_eq!(
            serde_json::from_str::<LlmProviderType>("\"ollama\"").unwrap(),
            LlmProviderType::Ollama
        );
        assert_eq!(
            serde_json::from_str::<LlmProviderType>("\"anthropic\"").unwrap(),
            LlmProviderType::Anthropic
        );
    }
}
