//! 100-nanosecond tick counts, as stored for every timestamp and duration.
//!
//! Absolute times count ticks since 0001-01-01T00:00:00 with no time-zone
//! information; durations are plain tick counts.  The raw `i64` is what is
//! persisted, so the value round-trips bit-for-bit regardless of whether it
//! maps onto a representable calendar date.

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticks(pub i64);

impl Ticks {
    pub const PER_SECOND: i64 = 10_000_000;
    /// Tick value of 1970-01-01T00:00:00.
    pub const UNIX_EPOCH: i64 = 621_355_968_000_000_000;

    /// Current wall-clock time in the local zone, zone information dropped.
    pub fn now_local() -> Self {
        Self::from_naive_datetime(Local::now().naive_local())
    }

    pub fn from_naive_datetime(dt: NaiveDateTime) -> Self {
        let utc = dt.and_utc();
        let sub = (utc.timestamp_subsec_nanos() / 100) as i64;
        Ticks(Self::UNIX_EPOCH + utc.timestamp() * Self::PER_SECOND + sub)
    }

    pub fn to_naive_datetime(self) -> Option<NaiveDateTime> {
        let rel = self.0.checked_sub(Self::UNIX_EPOCH)?;
        let secs = rel.div_euclid(Self::PER_SECOND);
        let nanos = (rel.rem_euclid(Self::PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
    }

    /// Interpret the value as an elapsed span.
    pub fn to_duration(self) -> Duration {
        Duration::microseconds(self.0 / 10) + Duration::nanoseconds((self.0 % 10) * 100)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{} ticks", self.0),
        }
    }
}
