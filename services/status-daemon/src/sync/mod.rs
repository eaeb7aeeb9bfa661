//! Schedule source synchronization.
//!
//! A sync pass compares the source's marker against the stored checkpoint,
//! and when they differ loads the source, plans the merge and applies it to
//! the store in one batch. The checkpoint only advances after the batch has
//! landed, so a failed pass is retried on the next trigger.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use facstat_reconcile::{plan_merge, MergeStats, SourceEntry, SyncCheckpoint};
use facstat_schedule::{validate, Clock, PersonRecord};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::source::{ScheduleSource, SourceBatch, SourceError};
use crate::store::{with_timeout, RecordStore, StoreError};

pub use worker::SyncWorker;

/// Errors that abort a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("schedule source error: {0}")]
    Source(#[from] SourceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The source matches the stored checkpoint; nothing was read.
    UpToDate,

    /// The source was merged and the checkpoint moved to `marker`.
    Merged { marker: String, stats: MergeStats },
}

/// Merges a schedule source into the record store.
pub struct Synchronizer {
    source: Arc<dyn ScheduleSource>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl Synchronizer {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            timeout,
        }
    }

    /// Sync if the source changed since the last successful pass.
    pub async fn sync_if_changed(&self) -> Result<SyncOutcome, SyncError> {
        self.sync(false).await
    }

    /// Run a sync pass. With `force` the marker check is skipped.
    #[instrument(skip(self))]
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome, SyncError> {
        let checkpoint = with_timeout(self.timeout, self.store.sync_checkpoint()).await?;
        let last = checkpoint.as_ref().map(|c| c.marker.as_str());

        if !force && !self.source.has_changed(last).await? {
            debug!(marker = ?last, "Schedule source unchanged");
            return Ok(SyncOutcome::UpToDate);
        }

        let marker = self.source.current_marker().await?;
        let SourceBatch { entries, rejected } = self.source.load().await?;
        let now = self.clock.now();
        report_entry_problems(&entries, now);

        let existing = with_timeout(self.timeout, self.store.list_all()).await?;
        let mut plan = plan_merge(&existing, &entries, now);
        plan.stats.rejected = rejected;

        if !plan.is_noop() {
            with_timeout(self.timeout, self.store.apply_merge(&plan)).await?;
        }
        with_timeout(
            self.timeout,
            self.store
                .set_sync_checkpoint(&SyncCheckpoint::new(marker.clone(), now)),
        )
        .await?;

        info!(
            marker = %marker,
            inserted = plan.stats.inserted,
            updated = plan.stats.updated,
            unchanged = plan.stats.unchanged,
            skipped = plan.stats.skipped,
            rejected = plan.stats.rejected,
            "Schedule source merged"
        );

        Ok(SyncOutcome::Merged {
            marker,
            stats: plan.stats,
        })
    }
}

/// Warn about entries that will be skipped or carry malformed intervals.
fn report_entry_problems(entries: &[SourceEntry], now: chrono::DateTime<chrono::Utc>) {
    for (index, entry) in entries.iter().enumerate() {
        let Some(id) = entry.identifier() else {
            warn!(index, "Skipping schedule entry without id or name");
            continue;
        };

        let mut probe = PersonRecord::new(id, now);
        entry.apply_to(&mut probe);
        for issue in validate(&probe.schedule) {
            warn!(person_id = %id, issue = %issue, "Malformed schedule interval ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use facstat_reconcile::ContentMarker;
    use facstat_schedule::FixedClock;
    use std::sync::Mutex;

    /// Source whose entries can be swapped between passes.
    struct StaticSource {
        entries: Mutex<Vec<SourceEntry>>,
        rejected: usize,
    }

    impl StaticSource {
        fn new(entries: Vec<SourceEntry>) -> Self {
            Self {
                entries: Mutex::new(entries),
                rejected: 0,
            }
        }

        fn replace(&self, entries: Vec<SourceEntry>) {
            *self.entries.lock().unwrap() = entries;
        }
    }

    #[async_trait]
    impl ScheduleSource for StaticSource {
        async fn current_marker(&self) -> Result<String, SourceError> {
            let json = serde_json::to_value(&*self.entries.lock().unwrap()).unwrap();
            Ok(ContentMarker::from_json(&json).into_string())
        }

        async fn load(&self) -> Result<SourceBatch, SourceError> {
            Ok(SourceBatch {
                entries: self.entries.lock().unwrap().clone(),
                rejected: self.rejected,
            })
        }
    }

    fn synchronizer(source: Arc<StaticSource>, store: Arc<MemoryStore>) -> Synchronizer {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        ));
        Synchronizer::new(source, store, clock, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_skips_unchanged_source() {
        let source = Arc::new(StaticSource::new(vec![SourceEntry::with_id("p1")]));
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(source.clone(), store.clone());

        let first = sync.sync_if_changed().await.unwrap();
        assert!(matches!(first, SyncOutcome::Merged { stats, .. } if stats.inserted == 1));
        assert_eq!(sync.sync_if_changed().await.unwrap(), SyncOutcome::UpToDate);

        source.replace(vec![SourceEntry::with_id("p1"), SourceEntry::with_id("p2")]);
        let third = sync.sync_if_changed().await.unwrap();
        assert!(matches!(third, SyncOutcome::Merged { stats, .. } if stats.inserted == 1));
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_forced_sync_of_same_source_changes_nothing() {
        let source = Arc::new(StaticSource::new(vec![SourceEntry::with_id("p1")]));
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(source, store);

        sync.sync(false).await.unwrap();
        let SyncOutcome::Merged { stats, .. } = sync.sync(true).await.unwrap() else {
            panic!("forced sync should merge");
        };
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.unchanged, 1);
    }

    #[tokio::test]
    async fn test_rejected_entries_do_not_block_merge() {
        let source = Arc::new(StaticSource {
            entries: Mutex::new(vec![SourceEntry::with_id("p1")]),
            rejected: 2,
        });
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(source, store.clone());

        let SyncOutcome::Merged { stats, .. } = sync.sync(false).await.unwrap() else {
            panic!("first sync should merge");
        };
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.rejected, 2);
        assert!(store.sync_checkpoint().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_checkpoint() {
        let source = Arc::new(StaticSource::new(vec![SourceEntry::with_id("p1")]));
        let store = Arc::new(MemoryStore::new());
        store.fail_merges(true);
        let sync = synchronizer(source, store.clone());

        assert!(matches!(sync.sync(false).await, Err(SyncError::Store(_))));
        assert!(store.sync_checkpoint().await.unwrap().is_none());
        assert!(store.snapshot().await.is_empty());

        store.fail_merges(false);
        assert!(matches!(
            sync.sync(false).await.unwrap(),
            SyncOutcome::Merged { .. }
        ));
        assert!(store.sync_checkpoint().await.unwrap().is_some());
    }
}
