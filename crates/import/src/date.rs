use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("Date is empty")]
    Empty,
    #[error("Date too short: {0:?}")]
    TooShort(String),
    #[error("Invalid date: {0:?}")]
    InvalidDate(String),
}

/// Normalize an OFX date token to a calendar date.
///
/// Accepts `YYYYMMDD` with any trailing time/zone suffix
/// (`20240115120000.000[-5:EST]`), or an already-ISO `YYYY-MM-DD`.
/// Only the date portion is kept.
pub fn normalize_date(input: &str) -> Result<NaiveDate, DateFormatError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DateFormatError::Empty);
    }

    if ISO_DATE.is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| DateFormatError::InvalidDate(s.to_string()));
    }

    if s.chars().count() < 8 {
        return Err(DateFormatError::TooShort(s.to_string()));
    }
    let compact = match s.get(0..8) {
        Some(c) if c.bytes().all(|b| b.is_ascii_digit()) => c,
        _ => return Err(DateFormatError::InvalidDate(s.to_string())),
    };

    let (year, month, day) = (&compact[0..4], &compact[4..6], &compact[6..8]);
    let reassembled = format!("{year}-{month}-{day}");
    NaiveDate::parse_from_str(&reassembled, "%Y-%m-%d")
        .map_err(|_| DateFormatError::InvalidDate(s.to_string()))
}
