//! Five-field schedule expression (minute, hour, day-of-month, month, weekday).

use std::fmt;
use std::str::FromStr;

/// Errors from parsing a schedule expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid field '{0}'")]
    InvalidField(String),
}

/// A single expression field: wildcard, literal, or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Any,
    Value(u32),
    Step(u32),
}

impl Field {
    pub fn is_any(&self) -> bool {
        matches!(self, Field::Any)
    }

    /// Literal value, if this field is one.
    pub fn value(&self) -> Option<u32> {
        match self {
            Field::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Zero-padded form for literal fields, raw form otherwise.
    /// Used when rendering times as `HH:MM`.
    pub fn padded(&self) -> String {
        match self {
            Field::Value(v) => format!("{:02}", v),
            other => other.to_string(),
        }
    }
}

impl FromStr for Field {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Field::Any);
        }
        if let Some(step) = s.strip_prefix("*/") {
            return step
                .parse::<u32>()
                .map(Field::Step)
                .map_err(|_| ExpressionError::InvalidField(s.to_string()));
        }
        s.parse::<u32>()
            .map(Field::Value)
            .map_err(|_| ExpressionError::InvalidField(s.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Any => write!(f, "*"),
            Field::Value(v) => write!(f, "{}", v),
            Field::Step(n) => write!(f, "*/{}", n),
        }
    }
}

/// A parsed five-field schedule expression.
///
/// Parsing is all-or-nothing: either all five fields parse or the whole
/// expression is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    pub minute: Field,
    pub hour: Field,
    pub day_of_month: Field,
    pub month: Field,
    pub weekday: Field,
}

impl CronExpression {
    /// Every day at the given hour: `0 H * * *`
    pub fn daily(hour: u32) -> Self {
        Self {
            minute: Field::Value(0),
            hour: Field::Value(hour),
            day_of_month: Field::Any,
            month: Field::Any,
            weekday: Field::Any,
        }
    }

    /// Every week on `weekday` at the given hour: `0 H * * D`
    pub fn weekly(hour: u32, weekday: u32) -> Self {
        Self {
            weekday: Field::Value(weekday),
            ..Self::daily(hour)
        }
    }

    /// Every month on `day` at the given hour: `0 H D * *`
    pub fn monthly(hour: u32, day: u32) -> Self {
        Self {
            day_of_month: Field::Value(day),
            ..Self::daily(hour)
        }
    }

    /// Every `n` minutes: `*/n * * * *`
    pub fn every_minutes(n: u32) -> Self {
        Self {
            minute: Field::Step(n),
            hour: Field::Any,
            day_of_month: Field::Any,
            month: Field::Any,
            weekday: Field::Any,
        }
    }

    /// Every `n` hours: `0 */n * * *`
    pub fn every_hours(n: u32) -> Self {
        Self {
            minute: Field::Value(0),
            hour: Field::Step(n),
            day_of_month: Field::Any,
            month: Field::Any,
            weekday: Field::Any,
        }
    }
}

impl FromStr for CronExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(ExpressionError::FieldCount(parts.len()));
        }
        Ok(Self {
            minute: parts[0].parse()?,
            hour: parts[1].parse()?,
            day_of_month: parts[2].parse()?,
            month: parts[3].parse()?,
            weekday: parts[4].parse()?,
        })
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.weekday
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_expression() {
        let expr: CronExpression = "0 8 * * 4".parse().unwrap();
        assert_eq!(expr.minute, Field::Value(0));
        assert_eq!(expr.hour, Field::Value(8));
        assert_eq!(expr.weekday, Field::Value(4));
        assert_eq!(expr.to_string(), "0 8 * * 4");
    }

    #[test]
    fn parse_step_fields() {
        let expr: CronExpression = "*/5 * * * *".parse().unwrap();
        assert_eq!(expr.minute, Field::Step(5));
        assert_eq!(expr.to_string(), "*/5 * * * *");
    }

    #[test]
    fn reject_wrong_field_count() {
        assert_eq!(
            "0 8 * *".parse::<CronExpression>(),
            Err(ExpressionError::FieldCount(4))
        );
        assert_eq!(
            "0 8 * * * *".parse::<CronExpression>(),
            Err(ExpressionError::FieldCount(6))
        );
    }

    #[test]
    fn reject_malformed_field() {
        // All-or-nothing: one bad field rejects the whole expression.
        assert!(matches!(
            "0 8 * * x".parse::<CronExpression>(),
            Err(ExpressionError::InvalidField(_))
        ));
        assert!(matches!(
            "*/a 8 * * 1".parse::<CronExpression>(),
            Err(ExpressionError::InvalidField(_))
        ));
    }

    #[test]
    fn constructors_round_trip() {
        assert_eq!(CronExpression::daily(8).to_string(), "0 8 * * *");
        assert_eq!(CronExpression::weekly(9, 1).to_string(), "0 9 * * 1");
        assert_eq!(CronExpression::monthly(8, 15).to_string(), "0 8 15 * *");
        assert_eq!(CronExpression::every_minutes(5).to_string(), "*/5 * * * *");
        assert_eq!(CronExpression::every_hours(2).to_string(), "0 */2 * * *");
    }
}
