use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::config::ValidationError;

/// A trigger cadence in the event-rule grammar: either `rate(<value> <unit>)`
/// or `cron(<six fields>)`.
///
/// The grammar is checked here, at deploy time, because the scheduling
/// substrate otherwise rejects the rule only after the stack is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleExpression {
    Rate { value: u64, unit: RateUnit },
    Cron(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Minutes,
    Hours,
    Days,
}

impl RateUnit {
    fn parse(text: &str) -> Option<(Self, bool)> {
        match text {
            "minute" => Some((Self::Minutes, false)),
            "minutes" => Some((Self::Minutes, true)),
            "hour" => Some((Self::Hours, false)),
            "hours" => Some((Self::Hours, true)),
            "day" => Some((Self::Days, false)),
            "days" => Some((Self::Days, true)),
            _ => None,
        }
    }

    fn seconds(self) -> u64 {
        match self {
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }

    fn label(self, value: u64) -> &'static str {
        match (self, value == 1) {
            (Self::Minutes, true) => "minute",
            (Self::Minutes, false) => "minutes",
            (Self::Hours, true) => "hour",
            (Self::Hours, false) => "hours",
            (Self::Days, true) => "day",
            (Self::Days, false) => "days",
        }
    }
}

impl ScheduleExpression {
    /// Parse a schedule expression, enforcing the event-rule grammar:
    /// a single space inside `rate(...)`, a singular unit exactly when the
    /// value is 1, and six whitespace-separated fields inside `cron(...)`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();

        let rate_pattern = Regex::new(r"^rate\((\d+) (minute|minutes|hour|hours|day|days)\)$")
            .expect("rate pattern should compile");
        if let Some(captures) = rate_pattern.captures(trimmed) {
            let value: u64 = captures[1].parse().map_err(|_| {
                ValidationError::new(format!("rate value is out of range in '{trimmed}'"))
            })?;
            if value == 0 {
                return Err(ValidationError::new("rate value must be at least 1"));
            }
            let (unit, plural) =
                RateUnit::parse(&captures[2]).expect("rate unit is constrained by the pattern");
            if (value == 1) == plural {
                return Err(ValidationError::new(format!(
                    "rate unit must be singular for 1 and plural otherwise, got '{trimmed}'"
                )));
            }
            return Ok(Self::Rate { value, unit });
        }

        if let Some(inner) = trimmed
            .strip_prefix("cron(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let fields: Vec<&str> = inner.split_whitespace().collect();
            if fields.len() != 6 {
                return Err(ValidationError::new(format!(
                    "cron schedules take six fields (minute hour day-of-month month day-of-week \
                     year), got {} in '{trimmed}'",
                    fields.len()
                )));
            }
            return Ok(Self::Cron(fields.join(" ")));
        }

        Err(ValidationError::new(format!(
            "schedule must be rate(<value> <unit>) or cron(<six fields>), got '{trimmed}'"
        )))
    }

    /// Interval between ticks for fixed-rate schedules. Cron cadence is
    /// owned by the deployed event rule, so there is nothing to report.
    pub fn fixed_interval(&self) -> Option<Duration> {
        match self {
            Self::Rate { value, unit } => {
                Some(Duration::from_secs(value.saturating_mul(unit.seconds())))
            }
            Self::Cron(_) => None,
        }
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rate { value, unit } => write!(f, "rate({value} {})", unit.label(*value)),
            Self::Cron(fields) => write!(f, "cron({fields})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_rate_parses_with_its_interval() {
        let schedule =
            ScheduleExpression::parse("rate(5 minutes)").expect("plural rate should parse");

        assert_eq!(
            schedule,
            ScheduleExpression::Rate {
                value: 5,
                unit: RateUnit::Minutes,
            }
        );
        assert_eq!(schedule.fixed_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn singular_rate_parses_for_value_one() {
        let schedule =
            ScheduleExpression::parse("rate(1 hour)").expect("rate(1 hour) should parse");
        assert_eq!(schedule.fixed_interval(), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn day_rates_scale_to_seconds() {
        let schedule =
            ScheduleExpression::parse("rate(2 days)").expect("rate(2 days) should parse");
        assert_eq!(
            schedule.fixed_interval(),
            Some(Duration::from_secs(2 * 86_400))
        );
    }

    #[test]
    fn number_and_unit_must_agree() {
        assert!(ScheduleExpression::parse("rate(1 minutes)").is_err());
        assert!(ScheduleExpression::parse("rate(5 minute)").is_err());
    }

    #[test]
    fn zero_rates_are_rejected() {
        assert!(ScheduleExpression::parse("rate(0 minutes)").is_err());
    }

    #[test]
    fn malformed_rates_are_rejected() {
        for text in [
            "rate(5m)",
            "rate(5  minutes)",
            "rate(five minutes)",
            "rate(5 weeks)",
            "every 5 minutes",
        ] {
            assert!(
                ScheduleExpression::parse(text).is_err(),
                "'{text}' should be rejected"
            );
        }
    }

    #[test]
    fn six_field_cron_parses_and_round_trips() {
        let schedule =
            ScheduleExpression::parse("cron(0/15 * * * ? *)").expect("cron should parse");

        assert_eq!(
            schedule,
            ScheduleExpression::Cron("0/15 * * * ? *".to_string())
        );
        assert_eq!(schedule.fixed_interval(), None);
        assert_eq!(schedule.to_string(), "cron(0/15 * * * ? *)");
    }

    #[test]
    fn five_field_cron_is_rejected() {
        let error = ScheduleExpression::parse("cron(0 12 * * ?)")
            .expect_err("five-field cron should be rejected");
        assert!(error.message().contains("six fields"));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(ScheduleExpression::parse("  rate(30 minutes)  ").is_ok());
    }

    #[test]
    fn rates_round_trip_through_display() {
        for text in ["rate(1 minute)", "rate(12 hours)", "rate(1 day)"] {
            let schedule = ScheduleExpression::parse(text).expect("rate should parse");
            assert_eq!(schedule.to_string(), text);
        }
    }
}
