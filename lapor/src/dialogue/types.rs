//! Core types for dialogue sessions and the slot map.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locale::Locale;

/// Unique identifier for a dialogue session
pub type SessionId = String;

/// The fixed slot schema of a report-schedule configuration.
///
/// Only these keys can ever appear in a [`SlotMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    MerchantId,
    ReportType,
    StatusFilter,
    DateRange,
    OutputFormat,
    CronSchedule,
    Timezone,
    EmailRecipients,
}

impl SlotKey {
    /// Fields tracked in the missing-field list. Date range is derived from
    /// the schedule shape at payload time and timezone has a default, so
    /// neither is ever asked for.
    pub const TRACKED: [SlotKey; 6] = [
        SlotKey::MerchantId,
        SlotKey::ReportType,
        SlotKey::StatusFilter,
        SlotKey::OutputFormat,
        SlotKey::CronSchedule,
        SlotKey::EmailRecipients,
    ];

    /// Hard-required fields checked for completeness, after optional-field
    /// defaults have been filled in.
    pub const REQUIRED: [SlotKey; 4] = [
        SlotKey::MerchantId,
        SlotKey::OutputFormat,
        SlotKey::CronSchedule,
        SlotKey::EmailRecipients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::MerchantId => "merchant_id",
            SlotKey::ReportType => "report_type",
            SlotKey::StatusFilter => "status_filter",
            SlotKey::DateRange => "date_range",
            SlotKey::OutputFormat => "output_format",
            SlotKey::CronSchedule => "cron_schedule",
            SlotKey::Timezone => "timezone",
            SlotKey::EmailRecipients => "email_recipients",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slot value: a scalar or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Text(String),
    List(Vec<String>),
}

impl SlotValue {
    /// Empty values count as missing.
    pub fn is_empty(&self) -> bool {
        match self {
            SlotValue::Text(s) => s.is_empty(),
            SlotValue::List(l) => l.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotValue::Text(s) => Some(s),
            SlotValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SlotValue::List(l) => Some(l),
            SlotValue::Text(_) => None,
        }
    }
}

impl From<String> for SlotValue {
    fn from(s: String) -> Self {
        SlotValue::Text(s)
    }
}

impl From<&str> for SlotValue {
    fn from(s: &str) -> Self {
        SlotValue::Text(s.to_string())
    }
}

impl From<Vec<String>> for SlotValue {
    fn from(l: Vec<String>) -> Self {
        SlotValue::List(l)
    }
}

/// Slot map: schema key → scalar or list value. Also the shape of the delta
/// an extraction pass produces for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotMap(BTreeMap<SlotKey, SlotValue>);

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; empty values are dropped so that absent and falsy
    /// stay indistinguishable.
    pub fn insert(&mut self, key: SlotKey, value: impl Into<SlotValue>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.insert(key, value);
        }
    }

    pub fn get(&self, key: SlotKey) -> Option<&SlotValue> {
        self.0.get(&key)
    }

    pub fn get_text(&self, key: SlotKey) -> Option<&str> {
        self.get(key).and_then(SlotValue::as_text)
    }

    pub fn get_list(&self, key: SlotKey) -> Option<&[String]> {
        self.get(key).and_then(SlotValue::as_list)
    }

    /// Present with a non-empty value.
    pub fn is_filled(&self, key: SlotKey) -> bool {
        self.get(key).map(|v| !v.is_empty()).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merge `delta` into this map. Later values overwrite earlier ones for
    /// the same key, which is what lets a user correct a field mid-dialogue.
    pub fn merge(&mut self, delta: &SlotMap) {
        for (key, value) in &delta.0 {
            self.0.insert(*key, value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &SlotValue)> {
        self.0.iter()
    }

    /// Tracked schema fields that are absent or empty, in schema order.
    pub fn missing_fields(&self) -> Vec<SlotKey> {
        SlotKey::TRACKED
            .iter()
            .copied()
            .filter(|key| !self.is_filled(*key))
            .collect()
    }
}

/// Who spoke in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Append-only, never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// What to ask for next, or `Confirm` when nothing is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AskMerchant,
    AskReportType,
    AskStatus,
    AskFormat,
    AskSchedule,
    AskRecipients,
    Confirm,
}

impl NextAction {
    /// The prompt target for a missing field.
    pub fn for_field(key: SlotKey) -> NextAction {
        match key {
            SlotKey::MerchantId => NextAction::AskMerchant,
            SlotKey::ReportType => NextAction::AskReportType,
            SlotKey::StatusFilter => NextAction::AskStatus,
            SlotKey::OutputFormat => NextAction::AskFormat,
            SlotKey::CronSchedule => NextAction::AskSchedule,
            SlotKey::EmailRecipients => NextAction::AskRecipients,
            // Fields with defaults are never prompted for; fall through to
            // the first real question.
            SlotKey::DateRange | SlotKey::Timezone => NextAction::AskMerchant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::AskMerchant => "ask_merchant",
            NextAction::AskReportType => "ask_report_type",
            NextAction::AskStatus => "ask_status",
            NextAction::AskFormat => "ask_format",
            NextAction::AskSchedule => "ask_schedule",
            NextAction::AskRecipients => "ask_recipients",
            NextAction::Confirm => "confirm",
        }
    }
}

/// One dialogue session: collected slots, turn history and derived progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    pub locale: Locale,
    pub started_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub slots: SlotMap,
    pub missing_fields: Vec<SlotKey>,
    pub next_action: NextAction,
    pub is_complete: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId, user_id: &str, locale: Locale) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            locale,
            started_at: Utc::now(),
            turns: Vec::new(),
            slots: SlotMap::new(),
            missing_fields: SlotKey::TRACKED.to_vec(),
            next_action: NextAction::AskMerchant,
            is_complete: false,
        }
    }

    /// The most recent turns, oldest first, for generation context.
    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    /// First user message of the conversation, used as the cache key for the
    /// stored outcome.
    pub fn first_user_message(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_dropped_on_insert() {
        let mut slots = SlotMap::new();
        slots.insert(SlotKey::MerchantId, "");
        slots.insert(SlotKey::EmailRecipients, Vec::<String>::new());
        assert!(slots.is_empty());
        assert!(!slots.is_filled(SlotKey::MerchantId));
    }

    #[test]
    fn merge_overwrites_for_corrections() {
        let mut slots = SlotMap::new();
        slots.insert(SlotKey::MerchantId, "FINPAY770");

        let mut delta = SlotMap::new();
        delta.insert(SlotKey::MerchantId, "MERCHANT001");
        slots.merge(&delta);

        assert_eq!(slots.get_text(SlotKey::MerchantId), Some("MERCHANT001"));
    }

    #[test]
    fn missing_fields_follow_schema_order() {
        let mut slots = SlotMap::new();
        assert_eq!(slots.missing_fields(), SlotKey::TRACKED.to_vec());

        slots.insert(SlotKey::MerchantId, "FINPAY770");
        let missing = slots.missing_fields();
        assert_eq!(missing.first(), Some(&SlotKey::ReportType));
        assert_eq!(missing.len(), 5);
    }

    #[test]
    fn slot_map_serializes_with_schema_keys() {
        let mut slots = SlotMap::new();
        slots.insert(SlotKey::MerchantId, "FINPAY770");
        slots.insert(
            SlotKey::EmailRecipients,
            vec!["finance@finpay.com".to_string()],
        );

        let json = serde_json::to_value(&slots).unwrap();
        assert_eq!(json["merchant_id"], "FINPAY770");
        assert_eq!(json["email_recipients"][0], "finance@finpay.com");
    }
}
