//! Cron expression parsing and next-occurrence computation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use croner::Cron;

use mft_core::error::AppError;
use mft_core::result::AppResult;

/// A parsed job schedule.
///
/// Accepts the classic 5-field form (minute precision) and the 6-field form
/// with a leading seconds field.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Arc<Cron>,
}

impl CronSchedule {
    /// Parse an expression, failing with `InvalidSchedule`.
    pub fn parse(expression: &str) -> AppResult<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(AppError::invalid_schedule("Schedule must not be empty"));
        }
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| {
                AppError::invalid_schedule(format!("Invalid cron expression '{expression}': {e}"))
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron: Arc::new(cron),
        })
    }

    /// The first occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).map_err(|e| {
            AppError::invalid_schedule(format!(
                "No upcoming occurrence for '{}': {e}",
                self.expression
            ))
        })
    }

    /// The expression as written.
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mft_core::error::ErrorKind;

    #[test]
    fn test_five_field_quarter_hour() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 7, 30).unwrap();
        assert_eq!(
            schedule.next_after(t).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_next_is_strictly_after() {
        let schedule = CronSchedule::parse("0 30 3 * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 3, 30, 0).unwrap();
        assert_eq!(
            schedule.next_after(at).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 3, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_expressions() {
        for bad in ["", "not a cron", "61 * * * *", "* * *"] {
            let err = CronSchedule::parse(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidSchedule, "{bad}");
        }
    }
}
