//! Anthropic Claude provider.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    build_http_client, ChatMessage, ChatRole, ChunkStream, LlmError, LlmProvider,
    LlmProviderConfig, ProviderInfo,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 200;

pub struct AnthropicProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicStreamDelta {
    #[serde(default)]
    delta: Option<AnthropicDeltaBody>,
}

#[derive(Deserialize)]
struct AnthropicDeltaBody {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, LlmError> {
        let client = build_http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey("anthropic"))
    }

    fn messages_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/messages", base)
    }

    /// System messages never go into the messages array; Anthropic takes the
    /// system prompt as a separate field.
    fn build_messages(&self, messages: &[ChatMessage]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| AnthropicMessage {
                role: match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    async fn send_request(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request = AnthropicRequest {
            model: &self.config.model,
            system: system_prompt,
            messages: self.build_messages(messages),
            max_tokens: self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.config.temperature,
            stream,
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!(
                "anthropic returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let response = self.send_request(system_prompt, messages, false).await?;
        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        if let Some(usage) = &body.usage {
            tracing::info!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                model = self.config.model.as_str(),
                "anthropic completion"
            );
        }

        let text = body
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .ok_or_else(|| LlmError::Malformed("empty content".to_string()))?;
        Ok(text)
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, LlmError> {
        let response = self.send_request(system_prompt, messages, true).await?;
        let mut events = response.bytes_stream().eventsource();
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => match event.event.as_str() {
                        "content_block_delta" => {
                            let text = serde_json::from_str::<AnthropicStreamDelta>(&event.data)
                                .ok()
                                .and_then(|d| d.delta)
                                .and_then(|d| d.text);
                            if let Some(text) = text {
                                if !text.is_empty() && tx.unbounded_send(Ok(text)).is_err() {
                                    return;
                                }
                            }
                        }
                        "message_stop" => return,
                        "error" => {
                            let _ = tx.unbounded_send(Err(LlmError::Http(event.data)));
                            return;
                        }
                        _ => {}
                    },
                    Err(e) => {
                        let _ = tx.unbounded_send(Err(LlmError::Http(e.to_string())));
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(rx))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "anthropic",
            model: self.config.model.clone(),
        }
    }
}
