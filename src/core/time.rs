//! Minute-granularity time buckets used as aggregation window keys.

use crate::core::error::{MeterError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time bucket encoded as `yyyyMMddHHmm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeBucket(i64);

impl TimeBucket {
    /// Truncates a millisecond timestamp to its minute bucket (UTC).
    pub fn minute(timestamp_millis: i64) -> Result<Self> {
        let time = DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
            .ok_or(MeterError::InvalidTimestamp(timestamp_millis))?;
        if time.year() < 0 || time.year() > 9999 {
            return Err(MeterError::InvalidTimestamp(timestamp_millis));
        }

        let bucket = i64::from(time.year()) * 100_000_000
            + i64::from(time.month()) * 1_000_000
            + i64::from(time.day()) * 10_000
            + i64::from(time.hour()) * 100
            + i64::from(time.minute());
        Ok(TimeBucket(bucket))
    }

    /// Returns the encoded bucket value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
