//! Schedule expression → human-readable text.

use super::expression::{CronExpression, Field};
use super::ScheduleTranslator;
use crate::locale::Locale;

const DAYS_ID: [&str; 7] = [
    "Minggu", "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu",
];
const DAYS_EN: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

const MONTHS_ID: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September",
    "Oktober", "November", "Desember",
];
const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn day_name(field: &Field, locale: Locale) -> String {
    let table = match locale {
        Locale::Id => &DAYS_ID,
        Locale::En => &DAYS_EN,
    };
    match field.value().and_then(|v| table.get(v as usize)) {
        Some(name) => (*name).to_string(),
        // Unknown index or non-literal field: generic label, never a failure.
        None => match locale {
            Locale::Id => format!("hari ke-{}", field),
            Locale::En => format!("day {}", field),
        },
    }
}

fn month_name(field: &Field, locale: Locale) -> String {
    let table = match locale {
        Locale::Id => &MONTHS_ID,
        Locale::En => &MONTHS_EN,
    };
    match field
        .value()
        .and_then(|v| v.checked_sub(1))
        .and_then(|v| table.get(v as usize))
    {
        Some(name) => (*name).to_string(),
        None => match locale {
            Locale::Id => format!("bulan ke-{}", field),
            Locale::En => format!("month {}", field),
        },
    }
}

/// `1` → `1st`, `22` → `22nd`; non-literal fields keep their raw form.
fn ordinal(field: &Field) -> String {
    match field.value() {
        Some(day) => {
            let suffix = if (11..=13).contains(&(day % 100)) {
                "th"
            } else {
                match day % 10 {
                    1 => "st",
                    2 => "nd",
                    3 => "rd",
                    _ => "th",
                }
            };
            format!("{}{}", day, suffix)
        }
        None => field.to_string(),
    }
}

impl ScheduleTranslator {
    /// Render an expression to human text for the given locale.
    ///
    /// Branch selection is by specificity, most specific first: weekday set,
    /// then day-of-month (with optional month), then month-only, then plain
    /// daily. Always returns non-empty text.
    pub fn render(&self, expr: &CronExpression, locale: Locale) -> String {
        let time = format!("{}:{}", expr.hour.padded(), expr.minute.padded());

        match locale {
            Locale::Id => self.render_id(expr, &time),
            Locale::En => self.render_en(expr, &time),
        }
    }

    /// Render a raw expression string, falling back to the input unchanged
    /// when it is not a valid five-field expression.
    pub fn render_raw(&self, raw: &str, locale: Locale) -> String {
        match raw.parse::<CronExpression>() {
            Ok(expr) => self.render(&expr, locale),
            Err(_) => raw.to_string(),
        }
    }

    fn render_id(&self, expr: &CronExpression, time: &str) -> String {
        if !expr.weekday.is_any() {
            return format!(
                "Setiap hari {} jam {}",
                day_name(&expr.weekday, Locale::Id),
                time
            );
        }
        if !expr.day_of_month.is_any() {
            if !expr.month.is_any() {
                return format!(
                    "Setiap tanggal {} {} jam {}",
                    expr.day_of_month,
                    month_name(&expr.month, Locale::Id),
                    time
                );
            }
            return format!("Setiap tanggal {} jam {}", expr.day_of_month, time);
        }
        if !expr.month.is_any() {
            return format!(
                "Setiap bulan {} jam {}",
                month_name(&expr.month, Locale::Id),
                time
            );
        }
        format!("Setiap hari jam {}", time)
    }

    fn render_en(&self, expr: &CronExpression, time: &str) -> String {
        if !expr.weekday.is_any() {
            return format!("Every {} at {}", day_name(&expr.weekday, Locale::En), time);
        }
        if !expr.day_of_month.is_any() {
            if !expr.month.is_any() {
                return format!(
                    "Every {} {} at {}",
                    month_name(&expr.month, Locale::En),
                    ordinal(&expr.day_of_month),
                    time
                );
            }
            return format!(
                "Every {} of the month at {}",
                ordinal(&expr.day_of_month),
                time
            );
        }
        if !expr.month.is_any() {
            return format!(
                "Every {} at {}",
                month_name(&expr.month, Locale::En),
                time
            );
        }
        format!("Every day at {}", time)
    }
}

#[cfg(test)]
mod tests {
    use super::super::expression::Field;
    use super::*;

    fn render(raw: &str, locale: Locale) -> String {
        ScheduleTranslator::default().render(&raw.parse().unwrap(), locale)
    }

    #[test]
    fn weekly_indonesian() {
        assert_eq!(render("0 8 * * 4", Locale::Id), "Setiap hari Kamis jam 08:00");
        assert_eq!(render("0 8 * * 1", Locale::Id), "Setiap hari Senin jam 08:00");
        assert_eq!(render("30 14 * * 5", Locale::Id), "Setiap hari Jumat jam 14:30");
    }

    #[test]
    fn monthly_indonesian() {
        assert_eq!(render("0 8 1 * *", Locale::Id), "Setiap tanggal 1 jam 08:00");
        assert_eq!(render("0 9 15 * *", Locale::Id), "Setiap tanggal 15 jam 09:00");
        assert_eq!(
            render("0 8 1 3 *", Locale::Id),
            "Setiap tanggal 1 Maret jam 08:00"
        );
    }

    #[test]
    fn daily_and_yearly_indonesian() {
        assert_eq!(render("0 8 * * *", Locale::Id), "Setiap hari jam 08:00");
        assert_eq!(render("0 7 * 6 *", Locale::Id), "Setiap bulan Juni jam 07:00");
    }

    #[test]
    fn english_renderings() {
        assert_eq!(render("0 8 * * 4", Locale::En), "Every Thursday at 08:00");
        assert_eq!(
            render("0 8 1 * *", Locale::En),
            "Every 1st of the month at 08:00"
        );
        assert_eq!(
            render("0 8 15 * *", Locale::En),
            "Every 15th of the month at 08:00"
        );
        assert_eq!(
            render("0 9 22 2 *", Locale::En),
            "Every February 22nd at 09:00"
        );
        assert_eq!(render("0 8 * * *", Locale::En), "Every day at 08:00");
    }

    #[test]
    fn unknown_indices_fall_back_to_generic_labels() {
        assert_eq!(render("0 8 * * 9", Locale::Id), "Setiap hari hari ke-9 jam 08:00");
        assert_eq!(render("0 8 * * 9", Locale::En), "Every day 9 at 08:00");
        assert_eq!(render("0 7 * 13 *", Locale::Id), "Setiap bulan bulan ke-13 jam 07:00");
    }

    #[test]
    fn render_raw_passes_invalid_through() {
        let t = ScheduleTranslator::default();
        assert_eq!(t.render_raw("not a cron", Locale::Id), "not a cron");
        assert_eq!(t.render_raw("0 8 * * 4", Locale::Id), "Setiap hari Kamis jam 08:00");
    }

    #[test]
    fn render_never_empty_for_any_field_shape() {
        let t = ScheduleTranslator::default();
        let shapes = [Field::Any, Field::Value(3), Field::Step(5)];
        for minute in shapes {
            for hour in shapes {
                for day in shapes {
                    for month in shapes {
                        for weekday in shapes {
                            let expr = CronExpression {
                                minute,
                                hour,
                                day_of_month: day,
                                month,
                                weekday,
                            };
                            for locale in [Locale::Id, Locale::En] {
                                assert!(!t.render(&expr, locale).is_empty());
                            }
                        }
                    }
                }
            }
        }
    }
}
