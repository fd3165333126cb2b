//! Column encodings shared by the repositories.
//!
//! The `Any` driver cannot decode chrono types, so instants are stored as Unix milliseconds,
//! dates as `YYYY-MM-DD` text and flags as 0/1 integers.

use crate::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};

pub fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::DecodeError(format!("timestamp out of range: {millis}")))
}

pub fn opt_from_millis(millis: Option<i64>) -> Result<Option<DateTime<Utc>>, DbError> {
    millis.map(from_millis).transpose()
}

pub fn date_to_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn date_from_text(text: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| DbError::DecodeError(format!("invalid date '{text}': {e}")))
}

pub fn flag(value: bool) -> i64 {
    i64::from(value)
}

/// Parses an enum column through its `FromStr` impl.
pub fn parse_column<T>(column: &str, raw: &str) -> Result<T, DbError>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| DbError::DecodeError(format!("column {column}: {e}")))
}
