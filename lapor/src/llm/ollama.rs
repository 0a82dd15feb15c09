//! Ollama chat provider (local models).

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    build_http_client, ChatMessage, ChatRole, ChunkStream, LlmError, LlmProvider,
    LlmProviderConfig, ProviderInfo,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
    repeat_penalty: f64,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
}

impl OllamaProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, LlmError> {
        let client = build_http_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/api/chat", base)
    }

    fn build_messages(&self, system_prompt: &str, messages: &[ChatMessage]) -> Vec<OllamaMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        out.push(OllamaMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        for message in messages {
            out.push(OllamaMessage {
                role: match message.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                }
                .to_string(),
                content: message.content.clone(),
            });
        }
        out
    }

    fn options(&self) -> OllamaOptions {
        OllamaOptions {
            temperature: self.config.temperature.unwrap_or(0.7),
            top_p: 0.9,
            num_predict: self.config.max_tokens.unwrap_or(100),
            repeat_penalty: 1.2,
        }
    }

    async fn send_request(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let request = OllamaChatRequest {
            model: &self.config.model,
            messages: self.build_messages(system_prompt, messages),
            stream,
            options: self.options(),
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!(
                "ollama returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let response = self.send_request(system_prompt, messages, false).await?;
        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(body.message.content.trim().to_string())
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, LlmError> {
        let response = self.send_request(system_prompt, messages, true).await?;
        let mut bytes = response.bytes_stream();
        let (tx, rx) = mpsc::unbounded();

        // Ollama streams newline-delimited JSON chunks. The forwarding task
        // stops as soon as the receiver is dropped, so a disconnecting client
        // cancels generation cleanly.
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.unbounded_send(Err(LlmError::Http(e.to_string())));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<OllamaStreamChunk>(line) {
                        Ok(parsed) => {
                            if let Some(message) = parsed.message {
                                if !message.content.is_empty()
                                    && tx.unbounded_send(Ok(message.content)).is_err()
                                {
                                    return;
                                }
                            }
                            if parsed.done {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = tx.unbounded_send(Err(LlmError::Malformed(e.to_string())));
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(rx))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "ollama",
            model: self.config.model.clone(),
        }
    }
}
