//! Human-readable summaries of collected data, shown before confirmation.

use crate::dialogue::{SlotKey, SlotMap};
use crate::locale::Locale;
use crate::schedule::ScheduleTranslator;

const REPORT_TYPES_ID: &[(&str, &str)] = &[
    ("transaction", "Transaksi"),
    ("settlement", "Settlement"),
    ("refund", "Refund"),
    ("payout", "Payout"),
];

const STATUS_LABELS_ID: &[(&str, &str)] = &[
    ("PAID", "Dibayar"),
    ("CAPTURED", "Berhasil"),
    ("FAILED", "Gagal"),
    ("EXPIRED", "Kadaluarsa"),
    ("PENDING", "Pending"),
    ("CANCELLED", "Dibatalkan"),
];

const DATE_RANGES_ID: &[(&str, &str)] = &[
    ("last_7_days", "7 hari terakhir"),
    ("last_30_days", "30 hari terakhir"),
    ("this_week", "Minggu ini"),
    ("last_week", "Minggu lalu"),
    ("this_month", "Bulan ini"),
    ("last_month", "Bulan lalu"),
    ("today", "Hari ini"),
    ("yesterday", "Kemarin"),
];

const DATE_RANGES_EN: &[(&str, &str)] = &[
    ("last_7_days", "Last 7 days"),
    ("last_30_days", "Last 30 days"),
    ("this_week", "This week"),
    ("last_week", "Last week"),
    ("this_month", "This month"),
    ("last_month", "Last month"),
    ("today", "Today"),
    ("yesterday", "Yesterday"),
];

const FORMAT_LABELS: &[(&str, &str)] = &[
    ("xlsx", "Excel (XLSX)"),
    ("csv", "CSV"),
    ("pdf", "PDF"),
    ("json", "JSON"),
];

fn lookup<'a>(table: &'a [(&str, &str)], key: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

/// Builds the ✓-line and compact summaries of a slot map.
pub struct SummaryBuilder {
    translator: ScheduleTranslator,
}

impl Default for SummaryBuilder {
    fn default() -> Self {
        Self {
            translator: ScheduleTranslator::default(),
        }
    }
}

impl SummaryBuilder {
    pub fn new(translator: ScheduleTranslator) -> Self {
        Self { translator }
    }

    /// One ✓-line per collected field, in schema order.
    pub fn build(&self, slots: &SlotMap, locale: Locale) -> String {
        let mut parts = Vec::new();

        if let Some(merchant) = slots.get_text(SlotKey::MerchantId) {
            parts.push(format!("✓ Merchant: {}", merchant));
        }
        if let Some(report_type) = slots.get_text(SlotKey::ReportType) {
            let label = match locale {
                Locale::Id => lookup(REPORT_TYPES_ID, report_type)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| report_type.to_string()),
                Locale::En => capitalize(report_type),
            };
            parts.push(match locale {
                Locale::Id => format!("✓ Jenis Laporan: {}", label),
                Locale::En => format!("✓ Report Type: {}", label),
            });
        }
        if let Some(statuses) = slots.get_list(SlotKey::StatusFilter) {
            let labels: Vec<String> = statuses
                .iter()
                .map(|s| match locale {
                    Locale::Id => lookup(STATUS_LABELS_ID, s)
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| s.clone()),
                    Locale::En => s.clone(),
                })
                .collect();
            parts.push(format!("✓ Status: {}", labels.join(", ")));
        }
        if let Some(range) = slots.get_text(SlotKey::DateRange) {
            let table = match locale {
                Locale::Id => DATE_RANGES_ID,
                Locale::En => DATE_RANGES_EN,
            };
            let label = lookup(table, range)
                .map(|l| l.to_string())
                .unwrap_or_else(|| range.to_string());
            parts.push(match locale {
                Locale::Id => format!("✓ Periode: {}", label),
                Locale::En => format!("✓ Period: {}", label),
            });
        }
        if let Some(format) = slots.get_text(SlotKey::OutputFormat) {
            let label = lookup(FORMAT_LABELS, format)
                .map(|l| l.to_string())
                .unwrap_or_else(|| format.to_uppercase());
            parts.push(format!("✓ Format: {}", label));
        }
        if let Some(cron) = slots.get_text(SlotKey::CronSchedule) {
            let readable = self.translator.render_raw(cron, locale);
            parts.push(match locale {
                Locale::Id => format!("✓ Jadwal: {}", readable),
                Locale::En => format!("✓ Schedule: {}", readable),
            });
        }
        if let Some(timezone) = slots.get_text(SlotKey::Timezone) {
            // The default zone is implied; only surface an explicit override.
            if timezone != crate::dialogue::DEFAULT_TIMEZONE {
                parts.push(match locale {
                    Locale::Id => format!("✓ Zona Waktu: {}", timezone),
                    Locale::En => format!("✓ Timezone: {}", timezone),
                });
            }
        }
        if let Some(recipients) = slots.get_list(SlotKey::EmailRecipients) {
            parts.push(format!("✓ Email: {}", recipients.join(", ")));
        }

        if parts.is_empty() {
            return match locale {
                Locale::Id => "Belum ada data yang terkumpul".to_string(),
                Locale::En => "No data collected yet".to_string(),
            };
        }
        parts.join("\n")
    }

    /// Compact one-line summary, e.g.
    /// `Laporan Transaksi FINPAY770 (7 hari terakhir, Excel, setiap hari Kamis jam 08:00)`.
    pub fn build_compact(&self, slots: &SlotMap, locale: Locale) -> String {
        let mut head = Vec::new();
        if let Some(report_type) = slots.get_text(SlotKey::ReportType) {
            head.push(match locale {
                Locale::Id => format!(
                    "Laporan {}",
                    lookup(REPORT_TYPES_ID, report_type)
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| report_type.to_string())
                ),
                Locale::En => format!("{} Report", capitalize(report_type)),
            });
        }
        if let Some(merchant) = slots.get_text(SlotKey::MerchantId) {
            head.push(merchant.to_string());
        }

        let mut details = Vec::new();
        if let Some(range) = slots.get_text(SlotKey::DateRange) {
            let table = match locale {
                Locale::Id => DATE_RANGES_ID,
                Locale::En => DATE_RANGES_EN,
            };
            if let Some(label) = lookup(table, range) {
                details.push(match locale {
                    Locale::Id => label.to_string(),
                    Locale::En => label.to_lowercase(),
                });
            } else {
                details.push(range.to_string());
            }
        }
        if let Some(format) = slots.get_text(SlotKey::OutputFormat) {
            details.push(match format {
                "xlsx" => "Excel".to_string(),
                other => other.to_uppercase(),
            });
        }
        if let Some(cron) = slots.get_text(SlotKey::CronSchedule) {
            details.push(self.translator.render_raw(cron, locale).to_lowercase());
        }

        if details.is_empty() {
            head.join(" ")
        } else {
            format!("{} ({})", head.join(" "), details.join(", "))
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_slots() -> SlotMap {
        let mut slots = SlotMap::new();
        slots.insert(SlotKey::MerchantId, "FINPAY770");
        slots.insert(SlotKey::ReportType, "transaction");
        slots.insert(
            SlotKey::StatusFilter,
            vec!["PAID".to_string(), "CAPTURED".to_string()],
        );
        slots.insert(SlotKey::DateRange, "last_7_days");
        slots.insert(SlotKey::OutputFormat, "xlsx");
        slots.insert(SlotKey::CronSchedule, "0 8 * * 4");
        slots.insert(SlotKey::Timezone, "Asia/Jakarta");
        slots.insert(
            SlotKey::EmailRecipients,
            vec!["arif@fnnet.co.id".to_string()],
        );
        slots
    }

    #[test]
    fn indonesian_summary_lines() {
        let summary = SummaryBuilder::default().build(&sample_slots(), Locale::Id);
        assert_eq!(
            summary,
            "✓ Merchant: FINPAY770\n\
             ✓ Jenis Laporan: Transaksi\n\
             ✓ Status: Dibayar, Berhasil\n\
             ✓ Periode: 7 hari terakhir\n\
             ✓ Format: Excel (XLSX)\n\
             ✓ Jadwal: Setiap hari Kamis jam 08:00\n\
             ✓ Email: arif@fnnet.co.id"
        );
    }

    #[test]
    fn english_summary_lines() {
        let summary = SummaryBuilder::default().build(&sample_slots(), Locale::En);
        assert!(summary.contains("✓ Report Type: Transaction"));
        assert!(summary.contains("✓ Schedule: Every Thursday at 08:00"));
        assert!(summary.contains("✓ Period: Last 7 days"));
    }

    #[test]
    fn non_default_timezone_is_surfaced() {
        let mut slots = sample_slots();
        slots.insert(SlotKey::Timezone, "Asia/Makassar");
        let summary = SummaryBuilder::default().build(&slots, Locale::Id);
        assert!(summary.contains("✓ Zona Waktu: Asia/Makassar"));
    }

    #[test]
    fn empty_slots_have_a_placeholder() {
        let summary = SummaryBuilder::default().build(&SlotMap::new(), Locale::Id);
        assert_eq!(summary, "Belum ada data yang terkumpul");
    }

    #[test]
    fn compact_summary() {
        let compact = SummaryBuilder::default().build_compact(&sample_slots(), Locale::Id);
        assert_eq!(
            compact,
            "Laporan Transaksi FINPAY770 (7 hari terakhir, Excel, setiap hari kamis jam 08:00)"
        );
    }
}
