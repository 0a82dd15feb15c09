//! Assistant configuration: defaults, TOML file loading and environment
//! overrides.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_DEDUP_THRESHOLD, DEFAULT_SIMILARITY_THRESHOLD};
use crate::dialogue::DEFAULT_TIMEZONE;
use crate::llm::{LlmProviderConfig, LlmProviderType};
use crate::payload::PayloadDefaults;
use crate::schedule::DEFAULT_SCHEDULE_HOUR;

/// Errors from configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Embedding endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Disable to skip the similarity cache entirely.
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

/// Similarity cache thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub similarity_threshold: f64,
    pub dedup_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
        }
    }
}

/// Scheduling API endpoint the confirm flow submits to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleApiConfig {
    pub base_url: String,
    pub complete_path: String,
}

impl Default for ScheduleApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            complete_path: "/api/schedules/complete".to_string(),
        }
    }
}

/// Top-level assistant configuration.
/// Scalar fields come before the sections so the struct serializes cleanly
/// to TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Timezone attached to deltas when the message names none.
    pub default_timezone: String,
    /// Hour applied when a schedule phrase omits one.
    pub default_schedule_hour: u32,
    /// How many recent turns are sent as generation context.
    pub history_window: usize,
    /// Directory for the JSONL turn log; `None` disables it.
    pub turn_log_dir: Option<PathBuf>,
    pub llm: LlmProviderConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub schedule_api: ScheduleApiConfig,
    pub payload: PayloadDefaults,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            default_schedule_hour: DEFAULT_SCHEDULE_HOUR,
            history_window: 10,
            turn_log_dir: None,
            llm: LlmProviderConfig::default(),
            embedding: EmbeddingConfig::default(),
            cache: CacheConfig::default(),
            schedule_api: ScheduleApiConfig::default(),
            payload: PayloadDefaults::default(),
        }
    }
}

impl AssistantConfig {
    /// Load from a TOML file. Missing sections keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides on top of the current values.
    ///
    /// Recognized variables follow the deployment conventions:
    /// `LLM_PROVIDER`, `OLLAMA_MODEL`, `OLLAMA_HOST`, `CLAUDE_MODEL`,
    /// `ANTHROPIC_API_KEY`, `EMBEDDING_MODEL`, `VECTOR_SIMILARITY_THRESHOLD`,
    /// `GO_API_URL`, `GO_API_SCHEDULES_COMPLETE`, `DEFAULT_TIMEZONE`.
    pub fn apply_env(mut self) -> Self {
        if let Ok(provider) = env::var("LLM_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "ollama" => self.llm.provider_type = LlmProviderType::Ollama,
                "claude" | "anthropic" => self.llm.provider_type = LlmProviderType::Anthropic,
                "stub" => self.llm.provider_type = LlmProviderType::Stub,
                other => tracing::warn!("unknown LLM_PROVIDER '{}', keeping configured", other),
            }
        }
        match self.llm.provider_type {
            LlmProviderType::Anthropic => {
                if let Ok(model) = env::var("CLAUDE_MODEL") {
                    self.llm.model = model;
                }
            }
            _ => {
                if let Ok(model) = env::var("OLLAMA_MODEL") {
                    self.llm.model = model;
                }
            }
        }
        if let Ok(host) = env::var("OLLAMA_HOST") {
            if self.llm.provider_type == LlmProviderType::Ollama {
                self.llm.base_url = Some(host.clone());
            }
            self.embedding.base_url = host;
        }
        if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(threshold) = env::var("VECTOR_SIMILARITY_THRESHOLD") {
            match threshold.parse() {
                Ok(value) => self.cache.similarity_threshold = value,
                Err(_) => tracing::warn!("ignoring invalid VECTOR_SIMILARITY_THRESHOLD"),
            }
        }
        if let Ok(url) = env::var("GO_API_URL") {
            self.schedule_api.base_url = url;
        }
        if let Ok(path) = env::var("GO_API_SCHEDULES_COMPLETE") {
            self.schedule_api.complete_path = path;
        }
        if let Ok(timezone) = env::var("DEFAULT_TIMEZONE") {
            self.default_timezone = timezone;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AssistantConfig::default();
        assert_eq!(config.default_timezone, "Asia/Jakarta");
        assert_eq!(config.default_schedule_hour, 8);
        assert_eq!(config.history_window, 10);
        assert_eq!(config.cache.similarity_threshold, 0.85);
        assert_eq!(config.llm.provider_type, LlmProviderType::Ollama);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lapor.toml");
        std::fs::write(
            &path,
            r#"
default_timezone = "Asia/Makassar"

[llm]
provider_type = "stub"
model = "test-model"

[cache]
similarity_threshold = 0.9
"#,
        )
        .unwrap();

        let config = AssistantConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.default_timezone, "Asia/Makassar");
        assert_eq!(config.llm.provider_type, LlmProviderType::Stub);
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.cache.similarity_threshold, 0.9);
        // Untouched sections keep their defaults.
        assert_eq!(config.history_window, 10);
        assert_eq!(config.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AssistantConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
