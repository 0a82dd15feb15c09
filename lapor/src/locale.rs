//! Conversation locales.

use serde::{Deserialize, Serialize};

/// Supported conversation locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Indonesian
    Id,
    /// English
    En,
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Id
    }
}

impl Locale {
    /// Lenient parse for transport-level language tags ("id", "en",
    /// "indonesian", ...). Anything unrecognized falls back to Indonesian,
    /// the deployment default.
    pub fn parse(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "en" | "english" => Locale::En,
            _ => Locale::Id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Id => "id",
            Locale::En => "en",
        }
    }
}
