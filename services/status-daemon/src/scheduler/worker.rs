//! Scheduler background worker.
//!
//! Runs the recompute pass on a periodic interval.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use super::recompute::StatusRecomputer;

/// Scheduler worker that runs the recompute loop.
pub struct SchedulerWorker {
    recomputer: StatusRecomputer,
    interval: Duration,
}

impl SchedulerWorker {
    pub fn new(recomputer: StatusRecomputer, interval: Duration) -> Self {
        Self {
            recomputer,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    ///
    /// The first pass starts immediately. A pass runs inline in the loop, so
    /// a slow pass delays the next one instead of overlapping it.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.recomputer.recompute_all().await {
                        error!(error = %e, "Recompute pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
