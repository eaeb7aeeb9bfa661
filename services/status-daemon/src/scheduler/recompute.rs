//! One recomputation pass over every record.

use std::sync::Arc;
use std::time::Duration;

use facstat_schedule::{resolve, Calendar, CivilMoment, Clock, PersonRecord};
use tracing::{debug, info, instrument, warn};

use super::RecomputeError;
use crate::store::{with_timeout, RecordStore, StoreResult};
use crate::sweeper::OverrideSweeper;

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeStats {
    pub processed: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub swept: usize,
    pub failed: usize,
}

/// Resolves and persists status for every stored person.
pub struct StatusRecomputer {
    store: Arc<dyn RecordStore>,
    sweeper: OverrideSweeper,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
    timeout: Duration,
}

impl StatusRecomputer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        calendar: Calendar,
        timeout: Duration,
    ) -> Self {
        Self {
            sweeper: OverrideSweeper::new(Arc::clone(&store), timeout),
            store,
            clock,
            calendar,
            timeout,
        }
    }

    /// Run a single pass.
    ///
    /// The whole pass shares one civil moment, read once after the snapshot.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self) -> Result<RecomputeStats, RecomputeError> {
        let records = with_timeout(self.timeout, self.store.list_all())
            .await
            .map_err(RecomputeError::Snapshot)?;
        let now = self.calendar.now(self.clock.as_ref());

        let mut stats = RecomputeStats::default();
        for record in &records {
            stats.processed += 1;
            match self.recompute_one(record, &now).await {
                Ok(outcome) => {
                    if outcome.swept {
                        stats.swept += 1;
                    }
                    if outcome.changed {
                        stats.changed += 1;
                    } else {
                        stats.unchanged += 1;
                    }
                }
                Err(e) => {
                    warn!(person_id = %record.id, error = %e, "Failed to update status");
                    stats.failed += 1;
                }
            }
        }

        if stats.changed > 0 || stats.swept > 0 || stats.failed > 0 {
            info!(
                processed = stats.processed,
                changed = stats.changed,
                swept = stats.swept,
                failed = stats.failed,
                "Recompute pass complete"
            );
        } else {
            debug!(processed = stats.processed, "Recompute pass complete");
        }

        Ok(stats)
    }

    async fn recompute_one(
        &self,
        record: &PersonRecord,
        now: &CivilMoment,
    ) -> StoreResult<RecordOutcome> {
        let resolution = resolve(record, now);

        // A failed sweep is retried next tick; the status write goes ahead.
        let swept = resolution.override_expired && self.sweeper.sweep(&record.id).await.is_ok();

        if resolution.status.same_stored_form(&record.status) {
            return Ok(RecordOutcome {
                changed: false,
                swept,
            });
        }

        with_timeout(
            self.timeout,
            self.store
                .set_status(&record.id, &resolution.status, now.instant),
        )
        .await?;

        debug!(
            person_id = %record.id,
            from = %record.status,
            to = %resolution.status,
            "Status changed"
        );

        Ok(RecordOutcome {
            changed: true,
            swept,
        })
    }
}

struct RecordOutcome {
    changed: bool,
    swept: bool,
}
