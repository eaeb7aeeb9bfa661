//! Weekly schedule model and status resolution.
//!
//! This crate holds everything needed to answer "where is this person right
//! now?" without touching any I/O:
//!
//! - **Model**: [`PersonRecord`], its weekly [`Schedule`] and an optional
//!   [`ManualOverride`].
//! - **Calendar**: a [`Clock`] plus a fixed-offset [`Calendar`] that turns an
//!   instant into a civil weekday and `HH:MM` time.
//! - **Resolution**: [`resolve`] maps a record and a civil moment to exactly
//!   one [`Status`].
//!
//! # Invariants
//!
//! - Resolution is total and deterministic: the same record and moment always
//!   produce the same status, and there is always exactly one.
//! - Malformed intervals never match and never cause an error.

mod clock;
mod error;
mod record;
mod resolve;
mod status;
mod time;
mod validate;
mod weekday;

pub use clock::{Calendar, CivilMoment, Clock, FixedClock, SystemClock};
pub use error::ScheduleError;
pub use record::{ManualOverride, PersonRecord, Schedule, DEFAULT_PRECEDENCE};
pub use resolve::{resolve, Resolution};
pub use status::{Status, StatusView};
pub use time::{ClassSlot, Interval, TimeOfDay};
pub use validate::{validate, IssueKind, ScheduleIssue};
pub use weekday::Weekday;
