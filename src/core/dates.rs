use super::error::{FxError, Result};
use chrono::{Days, Local, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(FxError::MalformedInput(format!(
            "Invalid date format. Expected YYYY-MM-DD, got '{value}'"
        )));
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| FxError::MalformedInput(format!("Invalid date '{value}': {e}")))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn days_ago(today: NaiveDate, days: u32) -> Result<NaiveDate> {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| FxError::MalformedInput(format!("{days} days before {today} is out of range")))
}

/// Inclusive date range used for historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `[today - days_back, today - 1]`, both ends inclusive.
    pub fn trailing(today: NaiveDate, days_back: u32) -> Result<Self> {
        if days_back == 0 {
            return Err(FxError::MalformedInput(
                "Days back must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            start: days_ago(today, days_back)?,
            end: days_ago(today, 1)?,
        })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
