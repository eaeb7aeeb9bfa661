//! Status resolution.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. Active manual override.
//! 2. Weekend day.
//! 3. Class slot (first well-formed slot in list order containing now).
//! 4. Office hours.
//! 5. Off duty.
//!
//! The order is part of the contract and must not be rearranged.

use crate::{CivilMoment, PersonRecord, Status};

/// Outcome of resolving one record at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: Status,

    /// The record holds an override whose expiry has passed. It was ignored
    /// for this resolution; the caller is expected to clear it from the store.
    pub override_expired: bool,
}

impl Resolution {
    fn new(status: Status, override_expired: bool) -> Self {
        Self {
            status,
            override_expired,
        }
    }
}

/// Resolve a person's status at `now`.
///
/// Pure and total: never fails and never touches the store.
pub fn resolve(record: &PersonRecord, now: &CivilMoment) -> Resolution {
    let mut override_expired = false;

    if let Some(manual) = &record.manual_override {
        if manual.is_active(now.instant) {
            return Resolution::new(Status::Override(manual.status.clone()), false);
        }
        override_expired = true;
    }

    let status = resolve_schedule(record, now);
    Resolution::new(status, override_expired)
}

fn resolve_schedule(record: &PersonRecord, now: &CivilMoment) -> Status {
    let schedule = &record.schedule;

    if schedule.weekend_days.contains(&now.weekday) {
        return Status::OnWeekend;
    }

    let class = schedule
        .class_times
        .get(&now.weekday)
        .and_then(|slots| slots.iter().find(|slot| slot.contains(now.time)));
    if let Some(slot) = class {
        return Status::InClass {
            room: slot.room.clone(),
            batch: slot.batch.clone(),
        };
    }

    if schedule
        .office_hours
        .get(&now.weekday)
        .is_some_and(|hours| hours.contains(now.time))
    {
        return Status::AtDept;
    }

    Status::OffDuty
}
