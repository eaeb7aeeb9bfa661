//! Person records and their weekly schedules.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ClassSlot, Interval, Status, Weekday};

/// Display precedence for records that never specified one.
pub const DEFAULT_PRECEDENCE: i32 = 50;

fn default_precedence() -> i32 {
    DEFAULT_PRECEDENCE
}

/// The recurring weekly part of a person's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Days on which the person is categorically unavailable.
    #[serde(default)]
    pub weekend_days: BTreeSet<Weekday>,

    /// At most one office-hours interval per weekday.
    #[serde(default)]
    pub office_hours: BTreeMap<Weekday, Interval>,

    /// Classes per weekday, in priority order.
    ///
    /// The list is an ordered sequence, not a set: when slots overlap the
    /// earliest-listed one wins, so callers keep it sorted by intended
    /// priority rather than by start time.
    #[serde(default)]
    pub class_times: BTreeMap<Weekday, Vec<ClassSlot>>,

    /// Display ordering only; never consulted by resolution.
    #[serde(default = "default_precedence")]
    pub precedence: i32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            weekend_days: BTreeSet::new(),
            office_hours: BTreeMap::new(),
            class_times: BTreeMap::new(),
            precedence: DEFAULT_PRECEDENCE,
        }
    }
}

/// An administrator-set status that wins over the schedule until it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverride {
    /// Free-form status text.
    pub status: String,

    /// The override applies while `now < expires_at`.
    pub expires_at: DateTime<Utc>,
}

impl ManualOverride {
    pub fn new(status: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: status.into(),
            expires_at,
        }
    }

    /// Whether the override still applies at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// One tracked person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    /// Stable store key.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub schedule: Schedule,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<ManualOverride>,

    /// Last computed status. Written only by the recompute scheduler.
    pub status: Status,

    /// When `status` last changed, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_updated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonRecord {
    /// A fresh record with an empty schedule and `off_duty` status.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: None,
            schedule: Schedule::default(),
            manual_override: None,
            status: Status::OffDuty,
            status_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_override(mut self, manual_override: ManualOverride) -> Self {
        self.manual_override = Some(manual_override);
        self
    }

    /// The override, if it is still active at `now`.
    pub fn active_override(&self, now: DateTime<Utc>) -> Option<&ManualOverride> {
        self.manual_override
            .as_ref()
            .filter(|o| o.is_active(now))
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_schedule_deserializes_with_defaults() {
        let schedule: Schedule = serde_json::from_str("{}").unwrap();
        assert_eq!(schedule, Schedule::default());
        assert_eq!(schedule.precedence, 50);
    }

    #[test]
    fn test_schedule_camel_case_fields() {
        let schedule: Schedule = serde_json::from_value(serde_json::json!({
            "weekendDays": ["Friday"],
            "officeHours": { "Monday": { "start": "09:00", "end": "17:00" } },
            "classTimes": { "Monday": [{ "start": "10:00", "end": "11:00", "room": "301" }] },
            "precedence": 7
        }))
        .unwrap();

        assert!(schedule.weekend_days.contains(&Weekday::Friday));
        assert_eq!(
            schedule.office_hours[&Weekday::Monday],
            Interval::new("09:00", "17:00")
        );
        assert_eq!(schedule.class_times[&Weekday::Monday][0].room.as_deref(), Some("301"));
        assert_eq!(schedule.precedence, 7);
    }

    #[test]
    fn test_active_override_respects_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let record = PersonRecord::new("p1", now)
            .with_override(ManualOverride::new("in meeting", now + Duration::minutes(10)));

        assert!(record.active_override(now).is_some());
        assert!(record.active_override(now + Duration::minutes(9)).is_some());
        assert!(record.active_override(now + Duration::minutes(10)).is_none());
    }
}
