//! Merge planning against source entries as they appear in schedule files.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use facstat_reconcile::{apply_plan, plan_merge, OverrideWrite, PersonWrite, SourceEntry};
use facstat_schedule::{ManualOverride, PersonRecord};
use rstest::rstest;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn entries(json: serde_json::Value) -> Vec<SourceEntry> {
    serde_json::from_value(json).unwrap()
}

/// Stored override, source override, expected override write.
#[rstest]
#[case::running_kept_over_source(Some(10), Some(60), OverrideWrite::Keep)]
#[case::running_kept_without_source(Some(10), None, OverrideWrite::Keep)]
#[case::expired_cleared(Some(-5), None, OverrideWrite::Clear)]
#[case::expired_replaced(Some(-5), Some(60), OverrideWrite::Set(ManualOverride::new("from file", t0() + Duration::minutes(60))))]
#[case::none_set_from_source(None, Some(60), OverrideWrite::Set(ManualOverride::new("from file", t0() + Duration::minutes(60))))]
#[case::expired_source_ignored(None, Some(-1), OverrideWrite::Keep)]
fn test_override_write(
    #[case] stored_minutes: Option<i64>,
    #[case] source_minutes: Option<i64>,
    #[case] expected: OverrideWrite,
) {
    let mut existing = PersonRecord::new("p1", t0() - Duration::days(1));
    if let Some(m) = stored_minutes {
        existing = existing.with_override(ManualOverride::new("stored", t0() + Duration::minutes(m)));
    }

    let mut entry = SourceEntry::with_id("p1");
    entry.precedence = Some(7);
    if let Some(m) = source_minutes {
        entry.manual_override = Some("from file".into());
        entry.override_expiry = Some(t0() + Duration::minutes(m));
    }

    let plan = plan_merge(&[existing], &[entry], t0());
    let PersonWrite::Update { override_write, .. } = &plan.writes[0] else {
        panic!("expected update");
    };
    assert_eq!(*override_write, expected);
}

#[test]
fn test_name_keyed_roster_round() {
    let roster = entries(serde_json::json!([
        { "name": "Dr. Rahman", "weekendDays": ["Fri"], "precedence": 2 },
        { "id": "karim", "officeHours": { "monday": { "start": "09:00", "end": "12:00" } } },
        { "weekendDays": ["Sunday"] }
    ]));

    let plan = plan_merge(&[], &roster, t0());
    assert_eq!(plan.stats.inserted, 2);
    assert_eq!(plan.stats.skipped, 1);
    let ids: Vec<&str> = plan.writes.iter().map(PersonWrite::id).collect();
    assert_eq!(ids, vec!["Dr. Rahman", "karim"]);

    let mut records = BTreeMap::new();
    apply_plan(&mut records, &plan);
    assert_eq!(records["Dr. Rahman"].schedule.precedence, 2);
    assert_eq!(records["karim"].schedule.precedence, 50);

    // The roster edited one field; only that person changes.
    let edited = entries(serde_json::json!([
        { "name": "Dr. Rahman", "weekendDays": ["Fri"], "precedence": 3 },
        { "id": "karim", "officeHours": { "monday": { "start": "09:00", "end": "12:00" } } }
    ]));
    let snapshot: Vec<PersonRecord> = records.values().cloned().collect();
    let later = t0() + Duration::hours(1);
    let plan = plan_merge(&snapshot, &edited, later);
    assert_eq!(plan.stats.updated, 1);
    assert_eq!(plan.stats.unchanged, 1);

    apply_plan(&mut records, &plan);
    let rahman = &records["Dr. Rahman"];
    assert_eq!(rahman.schedule.precedence, 3);
    assert_eq!(rahman.created_at, t0());
    assert_eq!(rahman.updated_at, later);
    assert_eq!(records["karim"].updated_at, t0());
}
