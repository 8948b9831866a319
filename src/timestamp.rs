//! A UTC timestamp with millisecond precision.
//!
//! Archives record when they were last picked up by recovery. The stored form is an
//! RFC 3339 string, which keeps the document readable for operators; in memory it is an
//! `i64` of milliseconds since the UNIX epoch.
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Error returned when creating or parsing a `Timestamp`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The year is outside the supported range of `0` to `9999`.
    #[error("invalid year {0}, supported years are between 0 and 9999 included")]
    InvalidYear(i32),
    /// The milliseconds do not name a representable datetime.
    #[error("{0} milliseconds is out of range")]
    OutOfRange(i64),
    /// The string could not be parsed as a valid RFC 3339 datetime.
    #[error("failed to parse date {0} in rfc3339 format")]
    Parse(String),
}

/// A UTC datetime truncated to milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new `Timestamp` from a `chrono::DateTime<Utc>`.
    ///
    /// The datetime is truncated to millisecond precision.
    ///
    /// # Errors
    ///
    /// Returns an error if the year is outside the supported range of `0` to `9999`.
    pub fn new(datetime: DateTime<Utc>) -> Result<Timestamp, TimestampError> {
        let year = datetime.year();
        if !(0..=9999).contains(&year) {
            return Err(TimestampError::InvalidYear(year));
        }
        Ok(Timestamp(datetime.timestamp_millis()))
    }

    /// The current wall-clock time.
    pub fn now() -> Timestamp {
        Timestamp(Utc::now().timestamp_millis())
    }

    /// Creates a `Timestamp` from a number of milliseconds since the UNIX epoch.
    pub fn from_millis(milliseconds: i64) -> Result<Self, TimestampError> {
        let datetime = DateTime::from_timestamp_millis(milliseconds)
            .ok_or(TimestampError::OutOfRange(milliseconds))?;
        Self::new(datetime)
    }

    /// Returns the number of milliseconds since the UNIX epoch.
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    fn as_datetime(&self) -> DateTime<Utc> {
        // the constructors only admit millisecond values chrono can represent
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    // Formats the `Timestamp` as an RFC 3339 string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            &self
                .as_datetime()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<Timestamp> for serde_json::Value {
    fn from(value: Timestamp) -> Self {
        serde_json::Value::String(value.to_string())
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let datetime =
            DateTime::parse_from_rfc3339(s).map_err(|_| TimestampError::Parse(s.to_string()))?;
        Timestamp::new(datetime.to_utc())
    }
}
