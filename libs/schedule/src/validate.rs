//! Schedule data-quality checks.
//!
//! Resolution silently skips malformed intervals. These checks surface them
//! so they can be logged or shown to an administrator.

use std::fmt;

use serde::Serialize;

use crate::{Schedule, TimeOfDay, Weekday};

/// What is wrong with an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A bound is not a zero-padded `HH:MM`.
    UnparseableTime,

    /// `start >= end`; the interval can never match.
    EmptyInterval,
}

/// One malformed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleIssue {
    pub weekday: Weekday,

    /// `"office_hours"` or `"class_times[<index>]"`.
    pub location: String,

    pub kind: IssueKind,
    pub start: String,
    pub end: String,
}

impl fmt::Display for ScheduleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            IssueKind::UnparseableTime => "unparseable time",
            IssueKind::EmptyInterval => "start is not before end",
        };
        write!(
            f,
            "{} {}: {} ({}-{})",
            self.weekday, self.location, what, self.start, self.end
        )
    }
}

fn check(start: &str, end: &str) -> Option<IssueKind> {
    match (start.parse::<TimeOfDay>(), end.parse::<TimeOfDay>()) {
        (Ok(start), Ok(end)) if start < end => None,
        (Ok(_), Ok(_)) => Some(IssueKind::EmptyInterval),
        _ => Some(IssueKind::UnparseableTime),
    }
}

/// List every interval that resolution will ignore.
pub fn validate(schedule: &Schedule) -> Vec<ScheduleIssue> {
    let mut issues = Vec::new();

    for (weekday, hours) in &schedule.office_hours {
        if let Some(kind) = check(&hours.start, &hours.end) {
            issues.push(ScheduleIssue {
                weekday: *weekday,
                location: "office_hours".to_string(),
                kind,
                start: hours.start.clone(),
                end: hours.end.clone(),
            });
        }
    }

    for (weekday, slots) in &schedule.class_times {
        for (index, slot) in slots.iter().enumerate() {
            if let Some(kind) = check(&slot.start, &slot.end) {
                issues.push(ScheduleIssue {
                    weekday: *weekday,
                    location: format!("class_times[{index}]"),
                    kind,
                    start: slot.start.clone(),
                    end: slot.end.clone(),
                });
            }
        }
    }

    issues
}
