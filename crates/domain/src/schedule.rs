use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tempora_core::{AppError, AppResult};

/// Validated cron expression for a recurring trigger.
///
/// Accepts classic five-field expressions (minute precision) as well as the
/// six and seven field forms with a leading seconds column. Five-field
/// expressions number weekdays 0-7 from Sunday; the longer forms use the
/// Quartz numbering 1-7 from Sunday.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// Parses and validates a cron expression.
    pub fn parse(expression: &str) -> AppResult<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(AppError::Validation(
                "cron expression must not be empty".to_owned(),
            ));
        }

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = match fields.as_slice() {
            [minute, hour, day_of_month, month, day_of_week] => {
                let day_of_week = quartz_day_of_week(day_of_week)?;
                format!("0 {minute} {hour} {day_of_month} {month} {day_of_week}")
            }
            fields if matches!(fields.len(), 6 | 7) => expression.to_owned(),
            fields => {
                return Err(AppError::Validation(format!(
                    "cron expression '{expression}' has {} fields, expected 5, 6 or 7",
                    fields.len()
                )));
            }
        };

        let schedule = Schedule::from_str(normalized.as_str()).map_err(|error| {
            AppError::Validation(format!("invalid cron expression '{expression}': {error}"))
        })?;

        Ok(Self {
            expression: expression.to_owned(),
            schedule,
        })
    }

    /// Returns the expression as configured.
    #[must_use]
    pub fn expression(&self) -> &str {
        self.expression.as_str()
    }

    /// Returns the first fire time strictly after `instant`.
    #[must_use]
    pub fn next_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&instant).next()
    }
}

/// Renumbers a classic day-of-week field (Sunday is 0 or 7) to Sunday as 1.
fn quartz_day_of_week(field: &str) -> AppResult<String> {
    let mut items = Vec::new();

    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        let with_step = |base: String| match step {
            Some(step) => format!("{base}/{step}"),
            None => base,
        };

        match base.split_once('-') {
            Some((start, end)) => {
                let start = shift_weekday(start)?;
                if end != "7" {
                    items.push(with_step(format!("{start}-{}", shift_weekday(end)?)));
                } else if start == "1" {
                    items.push(with_step("1-7".to_owned()));
                } else {
                    // Ranges ending on Sunday wrap past Saturday.
                    items.push(with_step(format!("{start}-7")));
                    items.push("1".to_owned());
                }
            }
            None => items.push(with_step(shift_weekday(base)?)),
        }
    }

    Ok(items.join(","))
}

fn shift_weekday(token: &str) -> AppResult<String> {
    if token.is_empty() || !token.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(token.to_owned());
    }

    match token.parse::<u8>() {
        Ok(day @ 0..=6) => Ok((day + 1).to_string()),
        Ok(7) => Ok("1".to_owned()),
        _ => Err(AppError::Validation(format!(
            "day of week '{token}' is out of range, expected 0-7"
        ))),
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}

impl Display for CronSchedule {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.expression.as_str())
    }
}
