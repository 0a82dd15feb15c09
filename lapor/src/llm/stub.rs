//! Deterministic stub provider for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use super::{ChatMessage, ChunkStream, LlmError, LlmProvider, LlmProviderConfig, ProviderInfo};

pub struct StubLlmProvider {
    config: LlmProviderConfig,
    scripted: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(config: LlmProviderConfig) -> Self {
        Self {
            config,
            scripted: Mutex::new(Vec::new()),
        }
    }

    /// Pre-programmed replies, consumed in order. When the script is
    /// exhausted the provider falls back to its deterministic reply.
    pub fn with_script(config: LlmProviderConfig, replies: Vec<String>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            config,
            scripted: Mutex::new(replies),
        }
    }

    fn reply(&self, messages: &[ChatMessage]) -> String {
        if let Ok(mut scripted) = self.scripted.lock() {
            if let Some(reply) = scripted.pop() {
                return reply;
            }
        }

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if last.contains("All data complete") {
            return "Data lengkap! Ketik /confirm untuk eksekusi.".to_string();
        }
        if last.contains("Missing fields") || last.contains("data incomplete") {
            return "Oke! Boleh minta data berikutnya?".to_string();
        }
        "Siap, saya bantu buat jadwal laporannya.".to_string()
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        Ok(self.reply(messages))
    }

    async fn generate_stream(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, LlmError> {
        // Word-by-word chunks, so streaming consumers see more than one item.
        let chunks: Vec<Result<String, LlmError>> = self
            .reply(messages)
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "stub",
            model: self.config.model.clone(),
        }
    }
}
