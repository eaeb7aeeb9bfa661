//! Time-of-day values and half-open intervals.
//!
//! Interval bounds are kept as the raw strings they were written with so that
//! malformed data survives a round trip through storage untouched. They are
//! only interpreted when a window is needed, and a bound that does not parse
//! makes the whole interval inert.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ScheduleError;

/// Minutes since civil midnight, parsed from a zero-padded 24-hour `HH:MM`.
///
/// Ordering is numeric, which for well-formed strings is the same as
/// comparing the strings lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Build from hour and minute, if in range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.0 % 60)
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl From<chrono::NaiveTime> for TimeOfDay {
    /// Truncates to the minute.
    fn from(time: chrono::NaiveTime) -> Self {
        use chrono::Timelike;
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTime(s.to_string());

        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }

        let hour = u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0');
        let minute = u32::from(digits[2] - b'0') * 10 + u32::from(digits[3] - b'0');
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Parse both bounds and require `start < end`.
fn window(start: &str, end: &str) -> Option<(TimeOfDay, TimeOfDay)> {
    let start: TimeOfDay = start.parse().ok()?;
    let end: TimeOfDay = end.parse().ok()?;
    (start < end).then_some((start, end))
}

/// A half-open `[start, end)` interval within a single civil day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: String,
    pub end: String,
}

impl Interval {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parsed bounds, or `None` if either bound is malformed or `start >= end`.
    pub fn window(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        window(&self.start, &self.end)
    }

    /// Whether `at` falls inside a well-formed interval.
    pub fn contains(&self, at: TimeOfDay) -> bool {
        self.window()
            .is_some_and(|(start, end)| start <= at && at < end)
    }
}

/// One scheduled class on a weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSlot {
    pub start: String,
    pub end: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
}

impl ClassSlot {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            room: None,
            batch: None,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = Some(batch.into());
        self
    }

    /// Parsed bounds, or `None` if either bound is malformed or `start >= end`.
    pub fn window(&self) -> Option<(TimeOfDay, TimeOfDay)> {
        window(&self.start, &self.end)
    }

    /// Whether `at` falls inside a well-formed slot.
    pub fn contains(&self, at: TimeOfDay) -> bool {
        self.window()
            .is_some_and(|(start, end)| start <= at && at < end)
    }
}
