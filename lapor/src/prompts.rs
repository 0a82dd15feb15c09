//! System prompts for the report assistant.

use crate::locale::Locale;

const SYSTEM_PROMPT_ID: &str = r#"Kamu AI untuk buat jadwal laporan otomatis.

{merchant_context}

TUGAS:
Kumpulin data ini satu per satu: merchant_id, report_type, status_filter, output_format, cron_schedule, email_recipients

ATURAN:
1. [DATA TERKUMPUL: X] = SUDAH ada, JANGAN tanya lagi
2. Gaya bicara: natural, friendly, santai (bukan formal/kaku)
3. Tanya 1 field per kali, singkat tapi ramah (15-25 kata)
4. User bingung? Kasih contoh konkret
5. Data lengkap? Rangkum pakai tanda centang, minta /confirm

AUTO EKSTRAK:
"sukses" = PAID,CAPTURED | "gagal" = FAILED,EXPIRED | "7 hari" = last_7_days | "excel" = xlsx | "setiap hari jam X" = harian | "setiap senin jam X" = mingguan | "tgl X" = bulanan

CARA TANYA:
- "Merchant ID-nya apa?" atau "Untuk merchant mana?"
- "Format file-nya mau apa? Excel, CSV, atau PDF?"
- "Jadwalnya kapan? Contoh: setiap hari jam 9, setiap senin jam 10"
- "Email tujuannya?"

JANGAN:
- Pakai markdown (**, ##)
- Tanya data yang sudah di [DATA TERKUMPUL]
- Bilang "diproses" kalau masih kurang data
- Jawab pertanyaan di luar scope (cuaca, berita, dll)"#;

const SYSTEM_PROMPT_EN: &str = r#"You are an AI assistant for creating automated report schedules.

{merchant_context}

YOUR TASK:
Collect these fields one at a time: merchant_id, report_type, status_filter, output_format, cron_schedule, email_recipients

RULES:
1. [COLLECTED DATA: X] means the field is already known, never ask for it again
2. Keep the tone natural and friendly, never stiff
3. Ask for ONE field at a time, short but warm
4. If the user is confused, give a concrete example
5. When everything is collected, summarize with check marks and ask for /confirm

AUTO EXTRACTION:
"success" = PAID,CAPTURED | "failed" = FAILED,EXPIRED | "last 7 days" = last_7_days | "excel" = xlsx | "every day at X" = daily | "every monday at X" = weekly

DO NOT:
- Use markdown formatting
- Ask for data already listed as collected
- Say the report will be processed while data is still missing
- Answer questions outside report scheduling"#;

/// Render the allow-list into prompt context so the model refuses
/// out-of-scope merchants on its own.
fn merchant_context(allowed: Option<&[String]>, locale: Locale) -> String {
    match (allowed, locale) {
        (None, Locale::Id) => {
            "AKSES MERCHANT: Admin (semua merchant OK).".to_string()
        }
        (None, Locale::En) => "MERCHANT ACCESS: admin, every merchant is allowed.".to_string(),
        (Some([]), Locale::Id) => "AKSES MERCHANT: TIDAK ADA. Tolak semua request.".to_string(),
        (Some([]), Locale::En) => {
            "MERCHANT ACCESS: NONE. Refuse every request.".to_string()
        }
        (Some([only]), Locale::Id) => format!(
            "AKSES MERCHANT: {} (hanya ini). User pakai merchant lain? Tolak.",
            only
        ),
        (Some([only]), Locale::En) => format!(
            "MERCHANT ACCESS: {} only. Refuse any other merchant.",
            only
        ),
        (Some(list), Locale::Id) => format!(
            "AKSES MERCHANT: {}. User pakai merchant lain? Tolak dan sebutkan list ini.",
            list.join(", ")
        ),
        (Some(list), Locale::En) => format!(
            "MERCHANT ACCESS: {}. Refuse any merchant outside this list.",
            list.join(", ")
        ),
    }
}

/// System prompt for a locale, with the merchant context injected.
pub fn system_prompt(locale: Locale, allowed_merchants: Option<&[String]>) -> String {
    let base = match locale {
        Locale::Id => SYSTEM_PROMPT_ID,
        Locale::En => SYSTEM_PROMPT_EN,
    };
    base.replace("{merchant_context}", &merchant_context(allowed_merchants, locale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merchant_context_is_injected() {
        let prompt = system_prompt(Locale::Id, None);
        assert!(prompt.contains("AKSES MERCHANT: Admin"));
        assert!(!prompt.contains("{merchant_context}"));
    }

    #[test]
    fn allow_list_variants() {
        let one = vec!["FINPAY770".to_string()];
        assert!(system_prompt(Locale::Id, Some(&one)).contains("FINPAY770 (hanya ini)"));

        let many = vec!["FINPAY770".to_string(), "MERCHANT001".to_string()];
        assert!(system_prompt(Locale::En, Some(&many)).contains("FINPAY770, MERCHANT001"));

        assert!(system_prompt(Locale::Id, Some(&[])).contains("TIDAK ADA"));
    }
}
