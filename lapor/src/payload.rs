//! Execution-request composer: turns a completed slot map into the
//! `/schedules/complete` payload and submits it through a `ScheduleSink`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use croner::Cron;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dialogue::{SlotKey, SlotMap, DEFAULT_TIMEZONE};

/// Errors from schedule submission
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("schedule API request failed: {0}")]
    Http(String),
    #[error("schedule API rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePayload {
    pub cron_expression: String,
    pub timezone: String,
    pub is_active: bool,
    pub created_by: String,
    pub updated_by: String,
    pub configs: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub report_name: String,
    pub report_query: String,
    pub output_format: String,
    pub datasource_id: u32,
    pub parameters: ReportParameters,
    pub timeout_seconds: u32,
    pub max_rows: u32,
    pub deliveries: Vec<Delivery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportParameters {
    pub filters: Vec<Filter>,
    pub date_field: String,
    pub date_range: String,
    pub export_columns: Vec<String>,
    pub export_labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_name: String,
    pub method: String,
    pub max_retry: u32,
    pub retry_interval_minutes: u32,
    pub is_active: bool,
    pub delivery_config: DeliveryConfig,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub recipient_value: String,
    pub is_active: bool,
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReceipt {
    pub schedule_id: i64,
    #[serde(default)]
    pub config_id: Option<i64>,
}

/// Downstream consumer of a composed payload.
#[async_trait]
pub trait ScheduleSink: Send + Sync {
    async fn submit(&self, payload: &SchedulePayload) -> Result<ScheduleReceipt, SinkError>;
}

/// HTTP sink posting to the scheduling API.
pub struct HttpScheduleSink {
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct ScheduleApiResponse {
    #[serde(default)]
    data: Option<ScheduleReceipt>,
}

impl HttpScheduleSink {
    pub fn new(base_url: &str, path: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
        }
    }
}

#[async_trait]
impl ScheduleSink for HttpScheduleSink {
    async fn submit(&self, payload: &SchedulePayload) -> Result<ScheduleReceipt, SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header("X-User-ID", payload.created_by.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected(format!("{}: {}", status, body)));
        }

        let body: ScheduleApiResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;
        body.data
            .ok_or_else(|| SinkError::Rejected("response carried no schedule data".to_string()))
    }
}

static DAILY_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+ \d+ \* \* \*$").expect("daily shape"));
static WEEKLY_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+ \d+ \* \* [0-6]$").expect("weekly shape"));
static MONTHLY_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+ \d+ \d+ \* \*$").expect("monthly shape"));

/// Defaults applied to every composed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadDefaults {
    pub datasource_id: u32,
    pub timeout_seconds: u32,
    pub max_rows: u32,
    pub max_retry: u32,
    pub retry_interval_minutes: u32,
}

impl Default for PayloadDefaults {
    fn default() -> Self {
        Self {
            datasource_id: 13,
            timeout_seconds: 300,
            max_rows: 10_000,
            max_retry: 3,
            retry_interval_minutes: 5,
        }
    }
}

/// Builds the complete schedule payload from a completed slot map.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    defaults: PayloadDefaults,
}

impl PayloadBuilder {
    pub fn new(defaults: PayloadDefaults) -> Self {
        Self { defaults }
    }

    pub fn build(&self, slots: &SlotMap, user_id: &str) -> SchedulePayload {
        let cron = slots
            .get_text(SlotKey::CronSchedule)
            .unwrap_or("0 8 * * *")
            .to_string();
        let date_range = slots
            .get_text(SlotKey::DateRange)
            .map(|r| r.to_string())
            .unwrap_or_else(|| auto_date_range(&cron).to_string());

        SchedulePayload {
            timezone: slots
                .get_text(SlotKey::Timezone)
                .unwrap_or(DEFAULT_TIMEZONE)
                .to_string(),
            is_active: true,
            created_by: user_id.to_string(),
            updated_by: user_id.to_string(),
            configs: ReportConfig {
                report_name: report_name(slots, &cron),
                report_query: REPORT_QUERY.trim().to_string(),
                output_format: slots
                    .get_text(SlotKey::OutputFormat)
                    .unwrap_or("xlsx")
                    .to_string(),
                datasource_id: self.defaults.datasource_id,
                parameters: self.build_parameters(slots, date_range),
                timeout_seconds: self.defaults.timeout_seconds,
                max_rows: self.defaults.max_rows,
                deliveries: vec![self.build_delivery(slots)],
            },
            cron_expression: cron,
        }
    }

    fn build_parameters(&self, slots: &SlotMap, date_range: String) -> ReportParameters {
        let mut filters = Vec::new();
        if let Some(merchant) = slots.get_text(SlotKey::MerchantId) {
            filters.push(Filter {
                field: "merchant_id".to_string(),
                operator: "=".to_string(),
                value_type: "string".to_string(),
                value: serde_json::Value::String(merchant.to_string()),
            });
        }
        if let Some(statuses) = slots.get_list(SlotKey::StatusFilter) {
            filters.push(Filter {
                field: "payment_status".to_string(),
                operator: "IN".to_string(),
                value_type: "string".to_string(),
                value: serde_json::json!(statuses),
            });
        }

        ReportParameters {
            filters,
            date_field: "payment_at".to_string(),
            date_range,
            export_columns: EXPORT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            export_labels: EXPORT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    fn build_delivery(&self, slots: &SlotMap) -> Delivery {
        let recipients = slots
            .get_list(SlotKey::EmailRecipients)
            .unwrap_or_default();

        let delivery_name = match recipients {
            [only] => format!(
                "Email ke {}",
                capitalize(only.split('@').next().unwrap_or(only))
            ),
            _ => format!("Email ke {} recipients", recipients.len()),
        };

        Delivery {
            delivery_name,
            method: "email".to_string(),
            max_retry: self.defaults.max_retry,
            retry_interval_minutes: self.defaults.retry_interval_minutes,
            is_active: true,
            delivery_config: DeliveryConfig {
                subject: "Report: {{report_name}} - {{execution_date}}".to_string(),
                body: DELIVERY_BODY.to_string(),
            },
            recipients: recipients
                .iter()
                .map(|email| Recipient {
                    recipient_value: email.clone(),
                    is_active: true,
                })
                .collect(),
        }
    }
}

/// Derive the report window from the schedule shape: a daily report covers
/// yesterday, a weekly one last week, a monthly one last month, and stepped
/// schedules cover today.
pub fn auto_date_range(cron: &str) -> &'static str {
    if DAILY_SHAPE.is_match(cron) {
        return "yesterday";
    }
    if WEEKLY_SHAPE.is_match(cron) {
        return "last_week";
    }
    if MONTHLY_SHAPE.is_match(cron) {
        return "last_month";
    }
    if cron.contains("*/") {
        return "today";
    }
    "yesterday"
}

/// Next execution time for a confirm preview, `None` when the expression is
/// not schedulable.
pub fn next_run_preview(cron: &str) -> Option<DateTime<Utc>> {
    match Cron::new(cron).with_seconds_optional().parse() {
        Ok(parsed) => match parsed.find_next_occurrence(&Utc::now(), false) {
            Ok(next) => Some(next),
            Err(e) => {
                tracing::warn!("no next occurrence for cron '{}': {}", cron, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("failed to parse cron expression '{}': {}", cron, e);
            None
        }
    }
}

fn report_name(slots: &SlotMap, cron: &str) -> String {
    let report_type = capitalize(slots.get_text(SlotKey::ReportType).unwrap_or("report"));
    let merchant = slots.get_text(SlotKey::MerchantId).unwrap_or("Unknown");

    let frequency = if DAILY_SHAPE.is_match(cron) {
        "Harian"
    } else if WEEKLY_SHAPE.is_match(cron) {
        "Mingguan"
    } else if MONTHLY_SHAPE.is_match(cron) {
        "Bulanan"
    } else if cron.contains("*/") {
        "Periodik"
    } else {
        "Custom"
    };

    format!("{} {} - {}", report_type, merchant, frequency)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

const EXPORT_COLUMNS: [&str; 6] = [
    "trx_invoice",
    "payment_at",
    "total_capture_amount",
    "payment_status",
    "cust_name",
    "payment_channel",
];

const EXPORT_LABELS: [&str; 6] = [
    "Order ID",
    "Payment Date",
    "Amount",
    "Status",
    "Customer Name",
    "Payment Channel",
];

// Filters are applied through parameters, not baked into the WHERE clause;
// the executor combines them with the date window at run time.
const REPORT_QUERY: &str = r#"
SELECT
    ipg_trx_master.trx_invoice,
    ipg_trx_master.payment_at,
    ipg_trx_master.total_capture_amount,
    ipg_trx_master.payment_status,
    ipg_cust_detail.cust_name,
    ipg_trx_master.payment_channel
FROM ipg_trx_master
LEFT JOIN ipg_cust_detail ON ipg_trx_master.id = ipg_cust_detail.id_parent
ORDER BY ipg_trx_master.payment_at DESC
"#;

const DELIVERY_BODY: &str = "Terlampir report {{report_name}} untuk periode {{date_range}}.\n\n\
Generated at: {{execution_time}}\n\
Total rows: {{row_count}}\n\
File size: {{file_size}}\n\n\
---\n\
Automated report from Scheduling Report System";

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_slots() -> SlotMap {
        let mut slots = SlotMap::new();
        slots.insert(SlotKey::MerchantId, "FINPAY770");
        slots.insert(SlotKey::ReportType, "transaction");
        slots.insert(
            SlotKey::StatusFilter,
            vec!["PAID".to_string(), "CAPTURED".to_string()],
        );
        slots.insert(SlotKey::OutputFormat, "xlsx");
        slots.insert(SlotKey::CronSchedule, "0 8 * * *");
        slots.insert(SlotKey::Timezone, "Asia/Jakarta");
        slots.insert(
            SlotKey::EmailRecipients,
            vec!["finance@finpay.com".to_string(), "manager@finpay.com".to_string()],
        );
        slots
    }

    #[test]
    fn auto_date_range_from_cron_shape() {
        assert_eq!(auto_date_range("0 8 * * *"), "yesterday");
        assert_eq!(auto_date_range("0 9 * * 1"), "last_week");
        assert_eq!(auto_date_range("0 8 15 * *"), "last_month");
        assert_eq!(auto_date_range("*/5 * * * *"), "today");
        assert_eq!(auto_date_range(""), "yesterday");
    }

    #[test]
    fn payload_carries_slot_values_and_defaults() {
        let payload = PayloadBuilder::default().build(&complete_slots(), "user@example.com");

        assert_eq!(payload.cron_expression, "0 8 * * *");
        assert_eq!(payload.timezone, "Asia/Jakarta");
        assert!(payload.is_active);
        assert_eq!(payload.created_by, "user@example.com");
        assert_eq!(payload.configs.output_format, "xlsx");
        assert_eq!(payload.configs.datasource_id, 13);
        assert_eq!(payload.configs.report_name, "Transaction FINPAY770 - Harian");
        assert_eq!(payload.configs.parameters.date_range, "yesterday");
        assert!(payload.configs.report_query.starts_with("SELECT"));
    }

    #[test]
    fn filters_include_merchant_and_status() {
        let payload = PayloadBuilder::default().build(&complete_slots(), "u");
        let filters = &payload.configs.parameters.filters;
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].field, "merchant_id");
        assert_eq!(filters[0].value, serde_json::json!("FINPAY770"));
        assert_eq!(filters[1].operator, "IN");
        assert_eq!(filters[1].value, serde_json::json!(["PAID", "CAPTURED"]));
    }

    #[test]
    fn delivery_names_follow_recipient_count() {
        let payload = PayloadBuilder::default().build(&complete_slots(), "u");
        let delivery = &payload.configs.deliveries[0];
        assert_eq!(delivery.delivery_name, "Email ke 2 recipients");
        assert_eq!(delivery.recipients.len(), 2);

        let mut slots = complete_slots();
        slots.insert(
            SlotKey::EmailRecipients,
            vec!["finance@finpay.com".to_string()],
        );
        let payload = PayloadBuilder::default().build(&slots, "u");
        assert_eq!(
            payload.configs.deliveries[0].delivery_name,
            "Email ke Finance"
        );
    }

    #[test]
    fn explicit_date_range_wins_over_auto() {
        let mut slots = complete_slots();
        slots.insert(SlotKey::DateRange, "last_7_days");
        let payload = PayloadBuilder::default().build(&slots, "u");
        assert_eq!(payload.configs.parameters.date_range, "last_7_days");
    }

    #[test]
    fn next_run_preview_handles_bad_expressions() {
        assert!(next_run_preview("0 8 * * *").is_some());
        assert!(next_run_preview("not a cron").is_none());
    }
}
