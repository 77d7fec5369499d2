//! Parsing of the values a user types: deadlines, reminder leads,
//! priorities and list filters.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Priority;
use crate::state::TaskFilter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unrecognized priority {0:?} (use high, medium or low)")]
    Priority(String),
    #[error("unrecognized deadline {0:?} (use YYYY-MM-DD or YYYY-MM-DD HH:MM)")]
    Deadline(String),
    #[error("unrecognized reminder lead {0:?} (e.g. 15, 30m, 2h, 1d, 1w or none)")]
    Lead(String),
    #[error("unrecognized filter {0:?}")]
    Filter(String),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Time used when only a date is given.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

pub fn parse_priority(raw: &str) -> Result<Priority, InputError> {
    match raw.trim().to_lowercase().as_str() {
        "high" | "h" | "1" => Ok(Priority::High),
        "medium" | "med" | "m" | "2" => Ok(Priority::Medium),
        "low" | "l" | "3" => Ok(Priority::Low),
        _ => Err(InputError::Priority(raw.to_string())),
    }
}

/// `none` (or an empty value) clears the deadline.
pub fn parse_deadline(raw: &str) -> Result<Option<NaiveDateTime>, InputError> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(parsed));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| Some(date.and_time(end_of_day())))
        .map_err(|_| InputError::Deadline(raw.to_string()))
}

/// Lead time in minutes. A bare number means minutes; `none` clears it.
pub fn parse_lead(raw: &str) -> Result<Option<u32>, InputError> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() || value == "none" || value == "off" {
        return Ok(None);
    }
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u32 = digits
        .parse()
        .map_err(|_| InputError::Lead(raw.to_string()))?;
    let per_unit = match unit.trim() {
        "" | "m" | "min" | "mins" | "minute" | "minutes" => 1,
        "h" | "hr" | "hour" | "hours" => 60,
        "d" | "day" | "days" => 60 * 24,
        "w" | "week" | "weeks" => 60 * 24 * 7,
        _ => return Err(InputError::Lead(raw.to_string())),
    };
    amount
        .checked_mul(per_unit)
        .map(Some)
        .ok_or_else(|| InputError::Lead(raw.to_string()))
}

pub fn parse_filter(raw: &str) -> Result<TaskFilter, InputError> {
    match raw.trim().to_lowercase().as_str() {
        "" | "all" => Ok(TaskFilter::All),
        "overdue" => Ok(TaskFilter::Overdue),
        "completed" | "done" => Ok(TaskFilter::Completed),
        "pending" | "open" | "todo" => Ok(TaskFilter::Pending),
        other => parse_priority(other)
            .map(TaskFilter::Priority)
            .map_err(|_| InputError::Filter(raw.to_string())),
    }
}

/// Human form of a lead time, the inverse of `parse_lead` for whole units.
pub fn format_lead(minutes: u32) -> String {
    const WEEK: u32 = 60 * 24 * 7;
    const DAY: u32 = 60 * 24;
    match minutes {
        m if m > 0 && m % WEEK == 0 => format!("{}w", m / WEEK),
        m if m > 0 && m % DAY == 0 => format!("{}d", m / DAY),
        m if m > 0 && m % 60 == 0 => format!("{}h", m / 60),
        m => format!("{m}m"),
    }
}
