//! Merchant id extraction.
//!
//! Keyword-anchored patterns win over the generic uppercase heuristics, and
//! both paths filter candidates through stoplists of command/question words
//! so that ordinary conversation never reads as a merchant id.

use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns where an explicit marker announces the id. Case-insensitive.
static KEYWORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bmid[:\s]+([A-Za-z0-9_-]{3,})",
        r"(?i)merchant\s*id[:\s]+([A-Za-z0-9_-]{3,})",
        r"(?i)\bmerchant\s+([A-Za-z0-9_-]{3,})",
        r"(?i)\bmid\s+([A-Za-z0-9_-]{3,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("merchant keyword pattern"))
    .collect()
});

/// Shapes a bare merchant id tends to have. Case-sensitive on purpose: the
/// heuristics only trust tokens the user shouted in uppercase.
static GENERIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b([A-Z]{3,}[0-9]{2,})\b",
        r"\b([A-Z][A-Z0-9_-]{4,})\b",
        r"\b([0-9]{5,})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("merchant generic pattern"))
    .collect()
});

const KEYWORD_STOPLIST: [&str; 9] = [
    "ID", "TYPE", "STATUS", "FORMAT", "YANG", "APA", "BISA", "AJA", "SAJA",
];

const GENERIC_STOPLIST: [&str; 21] = [
    "REPORT", "TRANSAKSI", "LAPORAN", "EXCEL", "HARIAN", "SETIAP", "UNTUK", "DENGAN", "FORMAT",
    "KIRIM", "EMAIL", "HARI", "BULAN", "TAHUN", "TANGGAL", "YANG", "APA", "BISA", "AJA", "SAJA",
    "MERCHANT",
];

/// First accepted candidate wins; the result is upper-cased.
pub(super) fn extract(message: &str) -> Option<String> {
    for pattern in KEYWORD_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(message) {
            let candidate = caps[1].to_uppercase();
            if !KEYWORD_STOPLIST.contains(&candidate.as_str()) {
                return Some(candidate);
            }
        }
    }

    for pattern in GENERIC_PATTERNS.iter() {
        for caps in pattern.captures_iter(message) {
            let candidate = caps[1].to_uppercase();
            if !GENERIC_STOPLIST.contains(&candidate.as_str()) {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_anchored_extraction() {
        assert_eq!(extract("mid finpay770").as_deref(), Some("FINPAY770"));
        assert_eq!(extract("mid: finpay770").as_deref(), Some("FINPAY770"));
        assert_eq!(extract("merchant id: abc123").as_deref(), Some("ABC123"));
        assert_eq!(extract("merchant TEST_DEBUG").as_deref(), Some("TEST_DEBUG"));
    }

    #[test]
    fn generic_uppercase_shapes() {
        assert_eq!(extract("pakai FINPAY770 ya").as_deref(), Some("FINPAY770"));
        assert_eq!(extract("untuk COMP_A dong").as_deref(), Some("COMP_A"));
        assert_eq!(extract("nomor 1234567890").as_deref(), Some("1234567890"));
    }

    #[test]
    fn stoplists_filter_false_positives() {
        assert_eq!(extract("merchant yang bagus"), None);
        assert_eq!(extract("buatkan LAPORAN TRANSAKSI EXCEL"), None);
        assert_eq!(extract("KIRIM SETIAP HARI"), None);
    }

    #[test]
    fn keyword_path_beats_generic_path() {
        // OTHER999 appears first in the text but the keyword-anchored id wins.
        assert_eq!(
            extract("OTHER999 bukan, mid finpay770").as_deref(),
            Some("FINPAY770")
        );
    }

    #[test]
    fn plain_conversation_has_no_merchant() {
        assert_eq!(extract("buatkan report transaksi sukses"), None);
        assert_eq!(extract("setiap hari jam 8 pagi"), None);
    }
}
