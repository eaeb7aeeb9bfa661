//! Clock and civil calendar adapter.
//!
//! Status rules are written against the wall clock of one configured place,
//! not the server's local zone. [`Calendar`] pins that zone as a fixed UTC
//! offset and converts instants into a [`CivilMoment`].

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, Utc};

use crate::{ScheduleError, TimeOfDay, Weekday};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An instant together with its civil weekday and time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilMoment {
    pub instant: DateTime<Utc>,
    pub weekday: Weekday,
    pub time: TimeOfDay,
}

/// Converts instants to civil weekday and `HH:MM` in a fixed zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// UTC calendar.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parse an offset like `+06:00`, `-03:30`, `Z` or `UTC`.
    pub fn from_offset_str(s: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidOffset(s.to_string());
        let trimmed = s.trim();

        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let hm: TimeOfDay = rest.parse().map_err(|_| invalid())?;
        let seconds = sign * i32::from(hm.minutes()) * 60;

        FixedOffset::east_opt(seconds).map(Self::new).ok_or_else(invalid)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Civil weekday and time of day for `instant`.
    pub fn civil(&self, instant: DateTime<Utc>) -> CivilMoment {
        let local = instant.with_timezone(&self.offset);
        CivilMoment {
            instant,
            weekday: local.weekday().into(),
            time: local.time().into(),
        }
    }

    /// Civil moment for the clock's current instant.
    pub fn now(&self, clock: &dyn Clock) -> CivilMoment {
        self.civil(clock.now())
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}
