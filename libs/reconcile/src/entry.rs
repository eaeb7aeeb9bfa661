//! Raw entries read from an external schedule source.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use facstat_schedule::{ClassSlot, Interval, ManualOverride, PersonRecord, Weekday};
use serde::{Deserialize, Serialize};

/// One person as written in the external source.
///
/// Every field is optional. A field that is absent leaves the stored value
/// alone; only fields the source actually states are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub weekend_days: Option<BTreeSet<Weekday>>,

    #[serde(default)]
    pub office_hours: Option<BTreeMap<Weekday, Interval>>,

    #[serde(default)]
    pub class_times: Option<BTreeMap<Weekday, Vec<ClassSlot>>>,

    #[serde(default)]
    pub precedence: Option<i32>,

    #[serde(default)]
    pub manual_override: Option<String>,

    #[serde(default)]
    pub override_expiry: Option<DateTime<Utc>>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl SourceEntry {
    /// Entry keyed by `id`.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// The store key: `id`, or `name` when no id is given.
    ///
    /// Returns `None` when neither is present and non-blank. Such entries are
    /// skipped; a key is never made up.
    pub fn identifier(&self) -> Option<&str> {
        non_blank(self.id.as_ref()).or_else(|| non_blank(self.name.as_ref()))
    }

    /// The override this entry asks for, if it is complete and unexpired.
    pub fn override_at(&self, now: DateTime<Utc>) -> Option<ManualOverride> {
        let status = non_blank(self.manual_override.as_ref())?;
        let expires_at = self.override_expiry?;
        let manual = ManualOverride::new(status, expires_at);
        manual.is_active(now).then_some(manual)
    }

    /// Copy every stated non-override field onto `record`.
    pub fn apply_to(&self, record: &mut PersonRecord) {
        if let Some(name) = non_blank(self.name.as_ref()) {
            record.name = Some(name.to_string());
        }
        if let Some(days) = &self.weekend_days {
            record.schedule.weekend_days = days.clone();
        }
        if let Some(hours) = &self.office_hours {
            record.schedule.office_hours = hours.clone();
        }
        if let Some(classes) = &self.class_times {
            record.schedule.class_times = classes.clone();
        }
        if let Some(precedence) = self.precedence {
            record.schedule.precedence = precedence;
        }
    }
}
