//! Calendar decomposition of event timestamps.
//!
//! Mirrors the `time` dimension transform: epoch milliseconds are read as
//! a UTC instant and split into Gregorian parts. Weeks are ISO-8601 weeks
//! and `weekday` is the ISO day of week, 1 = Monday through 7 = Sunday.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

impl TimeParts {
    /// Decompose an epoch-millisecond timestamp. `None` if out of range.
    pub fn from_epoch_millis(ts: i64) -> Option<Self> {
        let start_time = DateTime::<Utc>::from_timestamp_millis(ts)?;
        Some(Self {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().number_from_monday(),
        })
    }

    pub fn epoch_millis(&self) -> i64 {
        self.start_time.timestamp_millis()
    }
}
