//! Free text → schedule expression.
//!
//! The grammar is an ordered list of `(predicate, builder)` rules evaluated
//! with early-exit. Priority is explicit data: a literal expression beats a
//! periodic interval, an interval beats a weekday phrase, and a weekday phrase
//! anywhere in the message blocks the generic daily and day-part rules.

use once_cell::sync::Lazy;
use regex::Regex;

use super::expression::CronExpression;
use super::ScheduleTranslator;

/// Weekday keywords in both locales, mapped to expression weekday indices
/// (0 = Sunday).
const WEEKDAY_KEYWORDS: &[(&str, u32)] = &[
    ("senin", 1),
    ("selasa", 2),
    ("rabu", 3),
    ("kamis", 4),
    ("jumat", 5),
    ("sabtu", 6),
    ("minggu", 0),
    ("monday", 1),
    ("tuesday", 2),
    ("wednesday", 3),
    ("thursday", 4),
    ("friday", 5),
    ("saturday", 6),
    ("sunday", 0),
];

/// Day-part phrases and their fixed daily hours.
const DAY_PART_HOURS: &[(&[&str], u32)] = &[
    (&["pagi", "morning"], 8),
    (&["siang", "noon"], 12),
    (&["sore", "afternoon"], 17),
    (&["malam", "night"], 20),
];

static LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)([\d*/,\-]+)\s+([\d*/,\-]+)\s+([\d*/,\-]+)\s+([\d*/,\-]+)\s+([\d*/,\-]+)(?:\s|$)")
        .expect("literal pattern")
});

static EVERY_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:setiap|every)\s+(\d+)\s+(?:menit|minutes?)\b").expect("minutes pattern"));

static EVERY_HOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:setiap|every)\s+(\d+)\s+(?:jam|hours?)\b").expect("hours pattern"));

static WEEKDAY_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(senin|selasa|rabu|kamis|jumat|sabtu|minggu|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b(?:\s+(?:weekly|mingguan))?\s+(?:(?:jam|pukul|at)\s+)?(\d{1,2})\b",
    )
    .expect("weekday pattern")
});

static DAILY_HOUR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:setiap|tiap)\s+hari\s+jam\s+(\d{1,2})|every\s+day\s+at\s+(\d{1,2})|daily\s+at\s+(\d{1,2})|jam\s+(\d{1,2})\s+(?:setiap|tiap)\s+hari)\b",
    )
    .expect("daily pattern")
});

static MONTHLY_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:setiap|tiap)\s+)?(?:tanggal|tgl)\s+(\d{1,2})\b(?:\s+(?:setiap|tiap|di)?\s*bulan)?(?:\s+(?:jam|pukul)\s+(\d{1,2})\b)?",
    )
    .expect("monthly id pattern")
});

static MONTHLY_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:every|monthly\s+on)\s+(\d{1,2})(?:st|nd|rd|th)?\s+at\s+(\d{1,2})|(\d{1,2})(?:st|nd|rd|th)?\s+of\s+every\s+month\s+at\s+(\d{1,2}))\b",
    )
    .expect("monthly en pattern")
});

static MONTHLY_GENERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:bulanan\s+jam|monthly\s+at)\s+(\d{1,2})\b").expect("monthly generic pattern")
});

/// One grammar rule: tried in order, first producing an expression wins.
struct ScheduleRule {
    name: &'static str,
    /// When true the rule is skipped if any weekday keyword occurs anywhere
    /// in the message, so a weekday-qualified request is never read as a
    /// plain daily one.
    weekday_free: bool,
    build: fn(&ScheduleTranslator, &str) -> Option<CronExpression>,
}

const RULES: &[ScheduleRule] = &[
    ScheduleRule {
        name: "literal",
        weekday_free: false,
        build: match_literal,
    },
    ScheduleRule {
        name: "every-minutes",
        weekday_free: false,
        build: match_every_minutes,
    },
    ScheduleRule {
        name: "every-hours",
        weekday_free: false,
        build: match_every_hours,
    },
    ScheduleRule {
        name: "weekday-hour",
        weekday_free: false,
        build: match_weekday_hour,
    },
    ScheduleRule {
        name: "daily-hour",
        weekday_free: true,
        build: match_daily_hour,
    },
    ScheduleRule {
        name: "monthly",
        weekday_free: false,
        build: match_monthly,
    },
    ScheduleRule {
        name: "day-part",
        weekday_free: true,
        build: match_day_part,
    },
];

pub(super) fn has_weekday_keyword(message: &str) -> bool {
    WEEKDAY_KEYWORDS.iter().any(|(kw, _)| message.contains(kw))
}

fn match_literal(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    let caps = LITERAL.captures(message)?;
    let raw = format!("{} {} {} {} {}", &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]);
    // Something resembling an expression but not parseable is a miss for
    // this rule, never a hard error.
    raw.parse().ok()
}

fn match_every_minutes(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    let caps = EVERY_MINUTES.captures(message)?;
    let minutes = caps[1].parse().ok()?;
    Some(CronExpression::every_minutes(minutes))
}

fn match_every_hours(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    let caps = EVERY_HOURS.captures(message)?;
    let hours = caps[1].parse().ok()?;
    Some(CronExpression::every_hours(hours))
}

fn match_weekday_hour(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    let caps = WEEKDAY_HOUR.captures(message)?;
    let day = WEEKDAY_KEYWORDS
        .iter()
        .find(|(kw, _)| *kw == &caps[1])
        .map(|(_, idx)| *idx)?;
    let hour = caps[2].parse().ok()?;
    Some(CronExpression::weekly(hour, day))
}

fn match_daily_hour(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    let caps = DAILY_HOUR.captures(message)?;
    let hour = caps
        .iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse().ok())?;
    Some(CronExpression::daily(hour))
}

fn match_monthly(t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    if let Some(caps) = MONTHLY_ID.captures(message) {
        let day = caps[1].parse().ok()?;
        let hour = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(t.default_hour);
        return Some(CronExpression::monthly(hour, day));
    }
    if let Some(caps) = MONTHLY_EN.captures(message) {
        let (day, hour) = match (caps.get(1), caps.get(3)) {
            (Some(d), _) => (d.as_str(), caps.get(2)?.as_str()),
            (_, Some(d)) => (d.as_str(), caps.get(4)?.as_str()),
            _ => return None,
        };
        return Some(CronExpression::monthly(hour.parse().ok()?, day.parse().ok()?));
    }
    if let Some(caps) = MONTHLY_GENERIC.captures(message) {
        // "bulanan jam 8" / "monthly at 8" means the 1st of the month.
        return Some(CronExpression::monthly(caps[1].parse().ok()?, 1));
    }
    None
}

fn match_day_part(_t: &ScheduleTranslator, message: &str) -> Option<CronExpression> {
    for (phrases, hour) in DAY_PART_HOURS {
        if phrases.iter().any(|p| message.contains(p)) {
            return Some(CronExpression::daily(*hour));
        }
    }
    None
}

impl ScheduleTranslator {
    /// Parse free text into a schedule expression.
    ///
    /// Returns `None` when no rule matches; an absent schedule is not an
    /// error, the dialogue will simply keep asking for one.
    pub fn to_expression(&self, text: &str) -> Option<CronExpression> {
        let message = text.to_lowercase();
        let weekday_present = has_weekday_keyword(&message);

        for rule in RULES {
            if rule.weekday_free && weekday_present {
                continue;
            }
            if let Some(expr) = (rule.build)(self, &message) {
                tracing::debug!(rule = rule.name, expression = %expr, "schedule phrase matched");
                return Some(expr);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::ScheduleTranslator;

    fn parse(text: &str) -> Option<String> {
        ScheduleTranslator::default()
            .to_expression(text)
            .map(|e| e.to_string())
    }

    #[test]
    fn literal_expression_passes_through() {
        assert_eq!(parse("0 8 * * 4").as_deref(), Some("0 8 * * 4"));
        assert_eq!(parse("jalankan 30 14 * * 5 ya").as_deref(), Some("30 14 * * 5"));
    }

    #[test]
    fn malformed_literal_is_a_miss() {
        // Resembles an expression but one field cannot parse.
        assert_eq!(parse("1-2 8 * * 4"), None);
    }

    #[test]
    fn periodic_intervals() {
        assert_eq!(parse("setiap 5 menit").as_deref(), Some("*/5 * * * *"));
        assert_eq!(parse("every 10 minutes").as_deref(), Some("*/10 * * * *"));
        assert_eq!(parse("setiap 2 jam").as_deref(), Some("0 */2 * * *"));
        assert_eq!(parse("every 3 hours").as_deref(), Some("0 */3 * * *"));
    }

    #[test]
    fn weekday_beats_generic_daily() {
        assert_eq!(parse("setiap hari kamis jam 8").as_deref(), Some("0 8 * * 4"));
        assert_eq!(parse("setiap senin jam 9").as_deref(), Some("0 9 * * 1"));
        assert_eq!(parse("every monday at 9").as_deref(), Some("0 9 * * 1"));
        assert_eq!(parse("kamis jam 8").as_deref(), Some("0 8 * * 4"));
        assert_eq!(parse("mingguan jumat jam 7").as_deref(), Some("0 7 * * 5"));
    }

    #[test]
    fn daily_only_without_weekday_keyword() {
        assert_eq!(parse("setiap hari jam 8").as_deref(), Some("0 8 * * *"));
        assert_eq!(parse("every day at 17").as_deref(), Some("0 17 * * *"));
        assert_eq!(parse("jam 6 setiap hari").as_deref(), Some("0 6 * * *"));
    }

    #[test]
    fn monthly_with_and_without_hour() {
        assert_eq!(parse("setiap tanggal 1 jam 8").as_deref(), Some("0 8 1 * *"));
        assert_eq!(parse("tanggal 15 setiap bulan jam 9").as_deref(), Some("0 9 15 * *"));
        // Omitted hour falls back to the configured default (08:00).
        assert_eq!(parse("setiap tgl 25").as_deref(), Some("0 8 25 * *"));
        assert_eq!(parse("monthly on 1st at 7").as_deref(), Some("0 7 1 * *"));
        assert_eq!(parse("15th of every month at 10").as_deref(), Some("0 10 15 * *"));
        assert_eq!(parse("bulanan jam 6").as_deref(), Some("0 6 1 * *"));
    }

    #[test]
    fn day_part_phrases() {
        assert_eq!(parse("kirim tiap pagi").as_deref(), Some("0 8 * * *"));
        assert_eq!(parse("report at noon please").as_deref(), Some("0 12 * * *"));
        assert_eq!(parse("sore aja").as_deref(), Some("0 17 * * *"));
        assert_eq!(parse("setiap malam").as_deref(), Some("0 20 * * *"));
    }

    #[test]
    fn day_part_blocked_by_weekday_keyword() {
        // "senin pagi" names a weekday without an hour; the day-part fallback
        // must not turn it into a plain daily schedule.
        assert_eq!(parse("senin pagi"), None);
    }

    #[test]
    fn this_week_phrase_is_not_a_sunday_schedule() {
        assert_eq!(parse("laporan minggu ini"), None);
    }

    #[test]
    fn no_match_yields_none() {
        assert_eq!(parse("buatkan report transaksi"), None);
        assert_eq!(parse(""), None);
    }
}
