//! lapor - conversational assistant for scheduled report configuration.
//!
//! Collects a report-schedule configuration (merchant, filters, output
//! format, timing, recipients) from free-text chat turns, one field at a
//! time, until the configuration is complete enough to hand to the
//! scheduling API.
//!
//! The crate is organized around four core pieces and their collaborators:
//! - [`schedule`]: five-field schedule expressions, parsed from and rendered
//!   to human text in two locales;
//! - [`extractor`]: deterministic multi-field entity extraction with an
//!   authorization short-circuit;
//! - [`dialogue`]: per-session slot map, turn history and "what to ask next"
//!   logic;
//! - [`cache`]: similarity cache of prior successful turns.
//!
//! [`assistant`] ties them to a generation provider ([`llm`]) and to the
//! execution side ([`payload`]); the feature-gated [`gateway`] exposes the
//! whole thing over HTTP/SSE.

pub mod assistant;
pub mod cache;
pub mod config;
pub mod dialogue;
pub mod extractor;
#[cfg(feature = "server")]
pub mod gateway;
pub mod history;
pub mod llm;
pub mod locale;
pub mod payload;
pub mod prompts;
pub mod schedule;
pub mod summary;

pub use assistant::{Assistant, AssistantError, TurnOutcome, TurnRequest};
pub use config::AssistantConfig;
pub use locale::Locale;
