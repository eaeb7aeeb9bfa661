//! Availability status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The status of one person at one instant.
///
/// Computed statuses are a closed set; administrator overrides carry free-form
/// text and are never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "StatusView", from = "StatusView")]
pub enum Status {
    /// An active manual override.
    Override(String),

    /// Today is one of the person's weekend days.
    OnWeekend,

    /// Inside a scheduled class.
    InClass {
        room: Option<String>,
        batch: Option<String>,
    },

    /// Inside office hours.
    AtDept,

    /// None of the above.
    #[default]
    OffDuty,
}

impl Status {
    pub const ON_WEEKEND: &'static str = "on_weekend";
    pub const IN_CLASS: &'static str = "in_class";
    pub const AT_DEPT: &'static str = "at_dept";
    pub const OFF_DUTY: &'static str = "off_duty";

    /// The status label as stored and displayed.
    pub fn label(&self) -> &str {
        match self {
            Self::Override(status) => status,
            Self::OnWeekend => Self::ON_WEEKEND,
            Self::InClass { .. } => Self::IN_CLASS,
            Self::AtDept => Self::AT_DEPT,
            Self::OffDuty => Self::OFF_DUTY,
        }
    }

    pub fn room(&self) -> Option<&str> {
        match self {
            Self::InClass { room, .. } => room.as_deref(),
            _ => None,
        }
    }

    pub fn batch(&self) -> Option<&str> {
        match self {
            Self::InClass { batch, .. } => batch.as_deref(),
            _ => None,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Self::Override(_))
    }

    /// Whether both statuses persist to the same columns.
    ///
    /// Use this rather than `==` to decide whether a write is needed, since an
    /// override spelled like a computed label does not survive a store round
    /// trip as an override.
    pub fn same_stored_form(&self, other: &Status) -> bool {
        self.label() == other.label()
            && self.room() == other.room()
            && self.batch() == other.batch()
    }

    /// Rebuild a status from its stored columns.
    ///
    /// Any label outside the computed set is read back as an override. An
    /// override whose text happens to equal a computed label reads back as
    /// that computed status, which displays identically.
    pub fn from_parts(label: &str, room: Option<String>, batch: Option<String>) -> Self {
        match label {
            Self::ON_WEEKEND => Self::OnWeekend,
            Self::IN_CLASS => Self::InClass { room, batch },
            Self::AT_DEPT => Self::AtDept,
            Self::OFF_DUTY => Self::OffDuty,
            other => Self::Override(other.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InClass { room: Some(room), .. } => write!(f, "{} ({room})", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

/// Wire shape of a [`Status`]: `{"status": "in_class", "room": "301", "batch": null}`.
///
/// `room` and `batch` are only emitted for `in_class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Option<String>>,
}

impl From<Status> for StatusView {
    fn from(status: Status) -> Self {
        match status {
            Status::InClass { room, batch } => Self {
                status: Status::IN_CLASS.to_string(),
                room: Some(room),
                batch: Some(batch),
            },
            other => Self {
                status: other.label().to_string(),
                room: None,
                batch: None,
            },
        }
    }
}

impl From<StatusView> for Status {
    fn from(view: StatusView) -> Self {
        Status::from_parts(
            &view.status,
            view.room.flatten(),
            view.batch.flatten(),
        )
    }
}
