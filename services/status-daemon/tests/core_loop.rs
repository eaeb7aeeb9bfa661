//! Integration tests for the sync + recompute loop.
//!
//! These tests drive the daemon's parts the way `main` wires them:
//! 1. A schedule source is merged into the store
//! 2. The scheduler resolves and persists every person's status
//! 3. Expired overrides are swept on the tick that first sees them

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use facstat_daemon::scheduler::{SchedulerWorker, StatusRecomputer};
use facstat_daemon::source::JsonFileSource;
use facstat_daemon::store::{MemoryStore, RecordStore, SqliteStore};
use facstat_daemon::sync::{SyncOutcome, SyncWorker, Synchronizer};
use facstat_schedule::{Calendar, Clock, FixedClock, ManualOverride, PersonRecord, Status};
use rstest::rstest;
use tokio::sync::watch;

const ROSTER: &str = r#"[
    {
        "id": "rahman",
        "name": "Dr. Rahman",
        "weekendDays": ["Friday", "Saturday"],
        "officeHours": { "Monday": { "start": "09:00", "end": "17:00" } },
        "classTimes": {
            "Monday": [{ "start": "10:00", "end": "11:00", "room": "301" }]
        },
        "precedence": 10
    },
    {
        "name": "Dr. Karim",
        "officeHours": { "Monday": { "start": "14:00", "end": "16:00" } }
    },
    { "precedence": 1 }
]"#;

/// Monday 2026-03-02 10:30 in UTC+06:00.
fn monday_1030_local() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 4, 30, 0).unwrap()
}

fn dhaka() -> Calendar {
    Calendar::from_offset_str("+06:00").unwrap()
}

fn roster_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn rewrite(file: &tempfile::NamedTempFile, contents: &str) {
    std::fs::write(file.path(), contents).unwrap();
}

struct Harness {
    clock: Arc<FixedClock>,
    synchronizer: Synchronizer,
    recomputer: StatusRecomputer,
}

fn harness(store: Arc<dyn RecordStore>, file: &tempfile::NamedTempFile) -> Harness {
    let clock = Arc::new(FixedClock::new(monday_1030_local()));
    let synchronizer = Synchronizer::new(
        Arc::new(JsonFileSource::new(file.path())),
        Arc::clone(&store),
        clock.clone(),
        Duration::from_secs(1),
    );
    let recomputer = StatusRecomputer::new(store, clock.clone(), dhaka(), Duration::from_millis(200));
    Harness {
        clock,
        synchronizer,
        recomputer,
    }
}

#[tokio::test]
async fn test_sync_then_recompute_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("facstat.db")).unwrap());
    let file = roster_file(ROSTER);
    let h = harness(store.clone(), &file);

    let SyncOutcome::Merged { stats, .. } = h.synchronizer.sync_if_changed().await.unwrap() else {
        panic!("first sync should merge");
    };
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.skipped, 1);

    let tick = h.recomputer.recompute_all().await.unwrap();
    assert_eq!(tick.processed, 2);
    assert_eq!(tick.failed, 0);

    let rahman = store.get("rahman").await.unwrap().unwrap();
    assert_eq!(
        rahman.status,
        Status::InClass {
            room: Some("301".into()),
            batch: None
        }
    );
    let karim = store.get("Dr. Karim").await.unwrap().unwrap();
    assert_eq!(karim.status, Status::OffDuty);

    // Listing follows precedence.
    let ids: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["rahman", "Dr. Karim"]);
}

#[tokio::test]
async fn test_override_survives_sync_and_is_swept_after_expiry() {
    let store = Arc::new(MemoryStore::new());
    let file = roster_file(ROSTER);
    let h = harness(store.clone(), &file);
    h.synchronizer.sync_if_changed().await.unwrap();

    let t0 = h.clock.now();
    store
        .set_override(
            "rahman",
            &ManualOverride::new("in a meeting", t0 + ChronoDuration::minutes(10)),
        )
        .await
        .unwrap();

    // T+1m: the file changes and gets merged; the override stays.
    h.clock.advance(ChronoDuration::minutes(1));
    rewrite(&file, &ROSTER.replace("\"precedence\": 10", "\"precedence\": 11"));
    let SyncOutcome::Merged { stats, .. } = h.synchronizer.sync_if_changed().await.unwrap() else {
        panic!("changed file should merge");
    };
    assert_eq!(stats.updated, 1);

    h.recomputer.recompute_all().await.unwrap();
    let rahman = store.get("rahman").await.unwrap().unwrap();
    assert_eq!(rahman.schedule.precedence, 11);
    assert_eq!(rahman.status, Status::Override("in a meeting".into()));

    // T+11m: expired, swept, back to the class schedule.
    h.clock.advance(ChronoDuration::minutes(10));
    let tick = h.recomputer.recompute_all().await.unwrap();
    assert_eq!(tick.swept, 1);
    let rahman = store.get("rahman").await.unwrap().unwrap();
    assert!(rahman.manual_override.is_none());
    assert!(matches!(rahman.status, Status::InClass { .. }));
}

#[tokio::test]
async fn test_unchanged_source_is_not_reread() {
    let store = Arc::new(MemoryStore::new());
    let file = roster_file(ROSTER);
    let h = harness(store.clone(), &file);

    h.synchronizer.sync_if_changed().await.unwrap();
    let before = store.snapshot().await;

    h.clock.advance(ChronoDuration::minutes(5));
    assert_eq!(
        h.synchronizer.sync_if_changed().await.unwrap(),
        SyncOutcome::UpToDate
    );

    let SyncOutcome::Merged { stats, .. } = h.synchronizer.sync(true).await.unwrap() else {
        panic!("forced sync should merge");
    };
    assert_eq!(stats.updated, 0);
    assert_eq!(store.snapshot().await, before);
}

#[rstest]
#[case::write_error(false)]
#[case::write_timeout(true)]
#[tokio::test]
async fn test_one_failing_record_does_not_stop_the_tick(#[case] stall: bool) {
    let now = monday_1030_local();
    let store = Arc::new(MemoryStore::with_records([
        PersonRecord::new("a", now),
        PersonRecord::new("b", now),
        PersonRecord::new("c", now),
    ]));
    for id in ["a", "b", "c"] {
        store
            .set_override(id, &ManualOverride::new("away", now + ChronoDuration::hours(1)))
            .await
            .unwrap();
    }
    if stall {
        store.stall_status_writes_for("b");
    } else {
        store.fail_status_writes_for("b");
    }

    let recomputer = StatusRecomputer::new(
        store.clone(),
        Arc::new(FixedClock::new(now)),
        dhaka(),
        Duration::from_millis(100),
    );
    let tick = recomputer.recompute_all().await.unwrap();

    assert_eq!(tick.processed, 3);
    assert_eq!(tick.changed, 2);
    assert_eq!(tick.failed, 1);
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot["a"].status, Status::Override("away".into()));
    assert_eq!(snapshot["b"].status, Status::OffDuty);
    assert_eq!(snapshot["c"].status, Status::Override("away".into()));
}

#[tokio::test]
async fn test_workers_stop_on_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let file = roster_file(ROSTER);
    let h = harness(store.clone(), &file);

    let scheduler = SchedulerWorker::new(h.recomputer, Duration::from_millis(20));
    let sync = SyncWorker::new(h.synchronizer, Duration::from_millis(20));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = tokio::spawn({
        let rx = shutdown_rx.clone();
        async move { scheduler.run(rx).await }
    });
    let sync_handle = tokio::spawn(async move { sync.run(shutdown_rx).await });

    // The sync worker picks the file up on its first poll; the scheduler
    // resolves it on a later tick.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = store.snapshot().await;
    assert!(matches!(snapshot["rahman"].status, Status::InClass { .. }));

    shutdown_tx.send(true).unwrap();
    for handle in [scheduler_handle, sync_handle] {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
