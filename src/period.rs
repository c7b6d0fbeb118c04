//! Calendar duration strings such as `30min`, `1d` or `10 minutes`.
//!
//! Only fixed-length units are accepted. Months and years have no fixed
//! duration in seconds and are rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
/// Longest period whose length in milliseconds fits an `i64`.
const MAX_SECONDS: u64 = i64::MAX as u64 / 1_000;

/// A fixed duration, ordered by its length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    seconds: u64,
}

impl Period {
    pub fn from_seconds(seconds: u64) -> Result<Self, FeatureError> {
        if seconds == 0 || seconds > MAX_SECONDS {
            return Err(FeatureError::InvalidPeriod(format!("{seconds}s")));
        }
        Ok(Self { seconds })
    }

    pub fn seconds(self) -> u64 {
        self.seconds
    }

    pub fn millis(self) -> i64 {
        self.seconds as i64 * 1_000
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        // Weeks render as days (`7d`).
        if s % DAY == 0 {
            write!(f, "{}d", s / DAY)
        } else if s % HOUR == 0 {
            write!(f, "{}h", s / HOUR)
        } else if s % MINUTE == 0 {
            write!(f, "{}min", s / MINUTE)
        } else {
            write!(f, "{s}s")
        }
    }
}

impl FromStr for Period {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_period(s)
    }
}

pub fn parse_period(input: &str) -> Result<Period, FeatureError> {
    let invalid = || FeatureError::InvalidPeriod(input.to_string());
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (count_raw, unit_raw) = trimmed.split_at(split);

    let count = if count_raw.is_empty() {
        1
    } else {
        count_raw.parse::<u64>().map_err(|_| invalid())?
    };

    let unit = unit_length(unit_raw.trim()).ok_or_else(invalid)?;
    let seconds = count.checked_mul(unit).ok_or_else(invalid)?;
    Period::from_seconds(seconds).map_err(|_| invalid())
}

pub fn parse_periods(inputs: &[String]) -> Result<Vec<Period>, FeatureError> {
    inputs.iter().map(|raw| parse_period(raw)).collect()
}

fn unit_length(unit: &str) -> Option<u64> {
    match unit {
        "s" | "S" | "sec" | "second" | "seconds" => Some(1),
        "min" | "T" | "minute" | "minutes" => Some(MINUTE),
        "h" | "H" | "hour" | "hours" => Some(HOUR),
        "d" | "D" | "day" | "days" => Some(DAY),
        "w" | "W" | "week" | "weeks" => Some(WEEK),
        _ => None,
    }
}
