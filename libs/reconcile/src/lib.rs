//! Reconciliation of an external schedule source into the record store.
//!
//! The source is an overlay: it adds people and overwrites the schedule
//! fields it states, but it never deletes anyone and never clobbers an
//! override that is still running. Planning is pure; the caller applies the
//! resulting [`MergePlan`] to its store in one atomic batch.
//!
//! # Invariants
//!
//! - Planning is deterministic given the same records, entries and instant.
//! - Applying a plan and planning again against the same source yields no
//!   writes.
//! - Unexpired overrides present before the merge are present after it.
//! - No record is removed.

mod entry;
mod marker;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use facstat_schedule::{ManualOverride, PersonRecord};

pub use entry::SourceEntry;
pub use marker::{ContentMarker, SyncCheckpoint};

/// How the override columns of an existing record should change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideWrite {
    /// Leave the stored override untouched.
    Keep,

    /// Store this override.
    Set(ManualOverride),

    /// Clear the stored override.
    Clear,
}

/// One write produced by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonWrite {
    /// A person the store has never seen. Stored with `off_duty` status.
    Insert(PersonRecord),

    /// Schedule fields of an existing person. Never touches the stored status
    /// or creation time.
    Update {
        record: PersonRecord,
        override_write: OverrideWrite,
    },
}

impl PersonWrite {
    pub fn record(&self) -> &PersonRecord {
        match self {
            Self::Insert(record) => record,
            Self::Update { record, .. } => record,
        }
    }

    pub fn id(&self) -> &str {
        &self.record().id
    }
}

/// Counts from one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,

    /// Entries without an identifier.
    pub skipped: usize,

    /// Entries the source could not decode. Planning never sees these, so
    /// the caller fills this in.
    pub rejected: usize,
}

/// The writes needed to bring the store in line with a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// At most one write per person, in order of first appearance in the
    /// source.
    pub writes: Vec<PersonWrite>,
    pub stats: MergeStats,
}

impl MergePlan {
    /// True if applying this plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Plan the merge of `entries` into `existing` as of `now`.
///
/// Entries are applied in order, so when the source repeats an identifier the
/// later entry is merged on top of the earlier one.
pub fn plan_merge(
    existing: &[PersonRecord],
    entries: &[SourceEntry],
    now: DateTime<Utc>,
) -> MergePlan {
    let originals: BTreeMap<&str, &PersonRecord> =
        existing.iter().map(|r| (r.id.as_str(), r)).collect();

    // Overrides still running are the only thing the source cannot replace.
    let stash: BTreeMap<&str, &ManualOverride> = existing
        .iter()
        .filter_map(|r| r.active_override(now).map(|o| (r.id.as_str(), o)))
        .collect();

    let mut working: BTreeMap<String, PersonRecord> = BTreeMap::new();
    let mut touched: Vec<String> = Vec::new();
    let mut inserted: BTreeSet<String> = BTreeSet::new();
    let mut stats = MergeStats::default();

    for entry in entries {
        let Some(id) = entry.identifier() else {
            stats.skipped += 1;
            continue;
        };

        let current = working
            .get(id)
            .cloned()
            .or_else(|| originals.get(id).map(|r| (*r).clone()));

        match current {
            Some(before) => {
                let mut record = before.clone();
                entry.apply_to(&mut record);
                record.manual_override = match stash.get(id) {
                    Some(stashed) => Some((*stashed).clone()),
                    None => entry.override_at(now),
                };

                if record == before {
                    stats.unchanged += 1;
                    continue;
                }

                record.updated_at = now;
                stats.updated += 1;
                if !touched.iter().any(|t| t == id) {
                    touched.push(id.to_string());
                }
                working.insert(id.to_string(), record);
            }
            None => {
                let mut record = PersonRecord::new(id, now);
                entry.apply_to(&mut record);
                record.manual_override = entry.override_at(now);

                stats.inserted += 1;
                touched.push(id.to_string());
                inserted.insert(id.to_string());
                working.insert(id.to_string(), record);
            }
        }
    }

    let writes = touched
        .into_iter()
        .filter_map(|id| working.remove(&id).map(|record| (id, record)))
        .map(|(id, record)| {
            if inserted.contains(&id) {
                return PersonWrite::Insert(record);
            }
            let stored = originals
                .get(id.as_str())
                .and_then(|r| r.manual_override.as_ref());
            let override_write = match (&record.manual_override, stored) {
                (merged, stored) if merged.as_ref() == stored => OverrideWrite::Keep,
                (Some(merged), _) => OverrideWrite::Set(merged.clone()),
                (None, _) => OverrideWrite::Clear,
            };
            PersonWrite::Update {
                record,
                override_write,
            }
        })
        .collect();

    MergePlan { writes, stats }
}

/// Apply a plan to an in-memory record set, the way a store applies it.
///
/// Inserts land with their planned contents. Updates replace name and
/// schedule, apply the override write, and keep the stored status and
/// creation time.
pub fn apply_plan(records: &mut BTreeMap<String, PersonRecord>, plan: &MergePlan) {
    for write in &plan.writes {
        match write {
            PersonWrite::Insert(record) => {
                records
                    .entry(record.id.clone())
                    .or_insert_with(|| record.clone());
            }
            PersonWrite::Update {
                record,
                override_write,
            } => {
                let Some(stored) = records.get_mut(&record.id) else {
                    continue;
                };
                stored.name = record.name.clone();
                stored.schedule = record.schedule.clone();
                stored.updated_at = record.updated_at;
                match override_write {
                    OverrideWrite::Keep => {}
                    OverrideWrite::Set(manual) => stored.manual_override = Some(manual.clone()),
                    OverrideWrite::Clear => stored.manual_override = None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use facstat_schedule::{ClassSlot, Interval, Status, Weekday};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn entry_with_office(id: &str, start: &str, end: &str) -> SourceEntry {
        let mut entry = SourceEntry::with_id(id);
        entry.office_hours = Some(BTreeMap::from([(
            Weekday::Monday,
            Interval::new(start, end),
        )]));
        entry
    }

    #[test]
    fn test_inserts_new_people_off_duty() {
        let plan = plan_merge(&[], &[entry_with_office("p1", "09:00", "17:00")], t0());

        assert_eq!(plan.stats.inserted, 1);
        assert_eq!(plan.writes.len(), 1);
        let PersonWrite::Insert(record) = &plan.writes[0] else {
            panic!("expected insert");
        };
        assert_eq!(record.status, Status::OffDuty);
        assert_eq!(record.manual_override, None);
        assert_eq!(record.created_at, t0());
    }

    #[test]
    fn test_skips_entries_without_identifier() {
        let entries = vec![SourceEntry::default(), SourceEntry::with_id("  ")];
        let plan = plan_merge(&[], &entries, t0());

        assert_eq!(plan.stats.skipped, 2);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_update_preserves_created_at_and_status() {
        let created = t0() - Duration::days(30);
        let mut existing = PersonRecord::new("p1", created);
        existing.status = Status::AtDept;

        let plan = plan_merge(
            &[existing],
            &[entry_with_office("p1", "10:00", "12:00")],
            t0(),
        );

        assert_eq!(plan.stats.updated, 1);
        let PersonWrite::Update {
            record,
            override_write,
        } = &plan.writes[0]
        else {
            panic!("expected update");
        };
        assert_eq!(record.created_at, created);
        assert_eq!(record.updated_at, t0());
        assert_eq!(record.status, Status::AtDept);
        assert_eq!(*override_write, OverrideWrite::Keep);
    }

    #[test]
    fn test_unchanged_entry_produces_no_write() {
        let mut existing = PersonRecord::new("p1", t0());
        existing
            .schedule
            .office_hours
            .insert(Weekday::Monday, Interval::new("09:00", "17:00"));

        let plan = plan_merge(
            &[existing],
            &[entry_with_office("p1", "09:00", "17:00")],
            t0(),
        );

        assert_eq!(plan.stats.unchanged, 1);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_running_override_survives_source_without_one() {
        let expiry = t0() + Duration::minutes(10);
        let existing =
            PersonRecord::new("p1", t0()).with_override(ManualOverride::new("in a meeting", expiry));

        let now = t0() + Duration::minutes(1);
        let plan = plan_merge(&[existing], &[entry_with_office("p1", "09:00", "17:00")], now);

        let PersonWrite::Update {
            record,
            override_write,
        } = &plan.writes[0]
        else {
            panic!("expected update");
        };
        assert_eq!(
            record.manual_override,
            Some(ManualOverride::new("in a meeting", expiry))
        );
        assert_eq!(*override_write, OverrideWrite::Keep);
    }

    #[test]
    fn test_running_override_beats_source_override() {
        let expiry = t0() + Duration::minutes(10);
        let existing =
            PersonRecord::new("p1", t0()).with_override(ManualOverride::new("in a meeting", expiry));

        let mut entry = SourceEntry::with_id("p1");
        entry.manual_override = Some("on leave".into());
        entry.override_expiry = Some(t0() + Duration::days(1));

        let plan = plan_merge(&[existing], &[entry], t0());
        assert!(plan.is_noop());
        assert_eq!(plan.stats.unchanged, 1);
    }

    #[test]
    fn test_expired_override_is_replaced_by_source_state() {
        let existing = PersonRecord::new("p1", t0())
            .with_override(ManualOverride::new("stale", t0() - Duration::minutes(1)));

        let plan = plan_merge(&[existing.clone()], &[SourceEntry::with_id("p1")], t0());
        let PersonWrite::Update { override_write, .. } = &plan.writes[0] else {
            panic!("expected update");
        };
        assert_eq!(*override_write, OverrideWrite::Clear);

        let mut entry = SourceEntry::with_id("p1");
        entry.manual_override = Some("on leave".into());
        entry.override_expiry = Some(t0() + Duration::hours(2));
        let plan = plan_merge(&[existing], &[entry], t0());
        let PersonWrite::Update { override_write, .. } = &plan.writes[0] else {
            panic!("expected update");
        };
        assert_eq!(
            *override_write,
            OverrideWrite::Set(ManualOverride::new("on leave", t0() + Duration::hours(2)))
        );
    }

    #[test]
    fn test_absent_people_are_not_deleted() {
        let existing = vec![PersonRecord::new("p1", t0()), PersonRecord::new("p2", t0())];
        let plan = plan_merge(&existing, &[SourceEntry::with_id("p1")], t0());

        let mut records: BTreeMap<String, PersonRecord> =
            existing.into_iter().map(|r| (r.id.clone(), r)).collect();
        apply_plan(&mut records, &plan);
        assert!(records.contains_key("p1"));
        assert!(records.contains_key("p2"));
    }

    #[test]
    fn test_duplicate_ids_merge_in_order() {
        let mut first = entry_with_office("p1", "09:00", "17:00");
        first.name = Some("First".into());
        let mut second = SourceEntry::with_id("p1");
        second.class_times = Some(BTreeMap::from([(
            Weekday::Monday,
            vec![ClassSlot::new("10:00", "11:00").with_room("301")],
        )]));

        let plan = plan_merge(&[], &[first, second], t0());

        assert_eq!(plan.stats.inserted, 1);
        assert_eq!(plan.stats.updated, 1);
        assert_eq!(plan.writes.len(), 1);
        let PersonWrite::Insert(record) = &plan.writes[0] else {
            panic!("expected insert");
        };
        assert_eq!(record.name.as_deref(), Some("First"));
        assert!(record.schedule.office_hours.contains_key(&Weekday::Monday));
        assert!(record.schedule.class_times.contains_key(&Weekday::Monday));
    }

    #[test]
    fn test_second_pass_is_noop() {
        let existing = vec![
            PersonRecord::new("p1", t0() - Duration::days(1)),
            PersonRecord::new("p2", t0() - Duration::days(1))
                .with_override(ManualOverride::new("away", t0() + Duration::hours(1))),
        ];
        let mut overridden = entry_with_office("p3", "08:00", "12:00");
        overridden.manual_override = Some("visiting".into());
        overridden.override_expiry = Some(t0() + Duration::hours(3));
        let entries = vec![
            entry_with_office("p1", "09:00", "17:00"),
            entry_with_office("p2", "09:00", "17:00"),
            overridden,
            SourceEntry::default(),
        ];

        let mut records: BTreeMap<String, PersonRecord> =
            existing.iter().map(|r| (r.id.clone(), r.clone())).collect();
        let first = plan_merge(&existing, &entries, t0());
        assert_eq!(first.stats.inserted, 1);
        assert_eq!(first.stats.updated, 2);
        apply_plan(&mut records, &first);

        let snapshot: Vec<PersonRecord> = records.values().cloned().collect();
        let later = t0() + Duration::minutes(5);
        let second = plan_merge(&snapshot, &entries, later);
        assert!(second.is_noop());
        assert_eq!(second.stats.unchanged, 3);
        assert_eq!(second.stats.skipped, 1);
    }
}
