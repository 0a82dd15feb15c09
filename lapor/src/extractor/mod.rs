//! Deterministic multi-field entity extraction.
//!
//! Independent sub-extractors run over one message and their non-empty
//! results are unioned into a single slot delta. Each sub-extractor owns a
//! disjoint key, so union order does not matter.

mod merchant;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialogue::{SlotKey, SlotMap, DEFAULT_TIMEZONE};
use crate::locale::Locale;
use crate::schedule::ScheduleTranslator;

/// A merchant id outside the caller's allow-list.
///
/// Fail-fast: when this is returned no other extraction result from the same
/// message is reported, so partial state is never committed for an
/// unauthorized request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("merchant {merchant_id} is not in the caller's allow-list")]
pub struct AuthorizationError {
    pub merchant_id: String,
    pub allowed: Vec<String>,
}

/// Ordered keyword buckets: the first bucket with a keyword present in the
/// lower-cased message wins.
const REPORT_TYPE_BUCKETS: &[(&str, &[&str])] = &[
    ("transaction", &["transaksi", "transaction", "payment", "pembayaran"]),
    ("settlement", &["settlement", "settle"]),
    ("refund", &["refund"]),
];

const STATUS_BUCKETS: &[(&[&str], &[&str])] = &[
    (
        &["PAID", "CAPTURED"],
        &["sukses", "success", "berhasil", "successful", "paid", "captured"],
    ),
    (
        &["FAILED", "EXPIRED", "CANCELLED"],
        &["gagal", "failed", "failure", "expired", "cancel"],
    ),
    (&["ALL"], &["semua", "all", "seluruh"]),
];

const DATE_RANGE_BUCKETS: &[(&str, &[&str])] = &[
    (
        "last_7_days",
        &["7 hari", "seminggu", "last 7 days", "past 7 days", "7 day"],
    ),
    (
        "last_30_days",
        &["30 hari", "sebulan", "last 30 days", "past 30 days", "30 day", "last month"],
    ),
    ("this_week", &["minggu ini", "this week"]),
    ("last_week", &["minggu lalu", "last week"]),
    ("this_month", &["bulan ini", "this month"]),
    ("today", &["hari ini", "today"]),
    ("yesterday", &["kemarin", "yesterday"]),
];

const OUTPUT_FORMAT_BUCKETS: &[(&str, &[&str])] = &[
    ("xlsx", &["excel", "xlsx", ".xlsx"]),
    ("csv", &["csv", ".csv"]),
    ("pdf", &["pdf", ".pdf"]),
];

/// Indonesian timezone markers. Checked in order; `wita` before `wit` matters
/// because the latter is a prefix of the former.
const TIMEZONE_MARKERS: &[(&str, &str)] = &[
    ("wib", "Asia/Jakarta"),
    ("wita", "Asia/Makassar"),
    ("wit", "Asia/Jayapura"),
];

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern")
});

fn match_bucket<'a>(message: &str, buckets: &[(&'a str, &[&str])]) -> Option<&'a str> {
    buckets
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| message.contains(kw)))
        .map(|(value, _)| *value)
}

/// Extracts report-schedule slots from one free-text message.
pub struct EntityExtractor {
    translator: ScheduleTranslator,
    default_timezone: String,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self {
            translator: ScheduleTranslator::default(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl EntityExtractor {
    pub fn new(translator: ScheduleTranslator, default_timezone: impl Into<String>) -> Self {
        Self {
            translator,
            default_timezone: default_timezone.into(),
        }
    }

    /// Parse one message into a slot delta.
    ///
    /// When an allow-list is supplied and the extracted merchant id is not a
    /// member, extraction stops immediately and only the authorization error
    /// is returned, even if other fields were recognizable in the message.
    pub fn parse(
        &self,
        message: &str,
        locale: Locale,
        allow_list: Option<&[String]>,
    ) -> Result<SlotMap, AuthorizationError> {
        let lower = message.to_lowercase();
        let mut delta = SlotMap::new();

        if let Some(merchant_id) = merchant::extract(message) {
            if let Some(allowed) = allow_list {
                if !allowed.iter().any(|m| m == &merchant_id) {
                    return Err(AuthorizationError {
                        merchant_id,
                        allowed: allowed.to_vec(),
                    });
                }
            }
            delta.insert(SlotKey::MerchantId, merchant_id);
        }

        if let Some(report_type) = match_bucket(&lower, REPORT_TYPE_BUCKETS) {
            delta.insert(SlotKey::ReportType, report_type);
        }

        if let Some((statuses, _)) = STATUS_BUCKETS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        {
            delta.insert(
                SlotKey::StatusFilter,
                statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            );
        }

        if let Some(date_range) = match_bucket(&lower, DATE_RANGE_BUCKETS) {
            delta.insert(SlotKey::DateRange, date_range);
        }

        if let Some(format) = match_bucket(&lower, OUTPUT_FORMAT_BUCKETS) {
            delta.insert(SlotKey::OutputFormat, format);
        }

        if let Some(expr) = self.translator.to_expression(&lower) {
            delta.insert(SlotKey::CronSchedule, expr.to_string());
        }
        // The delta always carries a timezone: an explicit marker when one is
        // present, the configured default otherwise.
        let timezone = TIMEZONE_MARKERS
            .iter()
            .find(|(marker, _)| lower.contains(marker))
            .map(|(_, tz)| *tz)
            .unwrap_or(self.default_timezone.as_str());
        delta.insert(SlotKey::Timezone, timezone);

        let emails: Vec<String> = EMAIL
            .find_iter(message)
            .map(|m| m.as_str().to_string())
            .collect();
        if !emails.is_empty() {
            delta.insert(SlotKey::EmailRecipients, emails);
        }

        tracing::debug!(
            locale = locale.as_str(),
            fields = delta.len(),
            "parsed entities from message"
        );
        Ok(delta)
    }
}
