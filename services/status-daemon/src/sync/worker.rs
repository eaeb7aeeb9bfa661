//! Sync background worker.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument};

use super::Synchronizer;

/// Polls the schedule source for changes and merges them.
pub struct SyncWorker {
    synchronizer: Synchronizer,
    interval: Duration,
}

impl SyncWorker {
    pub fn new(synchronizer: Synchronizer, interval: Duration) -> Self {
        Self {
            synchronizer,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    ///
    /// The startup sync is the caller's job, so the first poll waits one
    /// interval.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting sync worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.synchronizer.sync_if_changed().await {
                        error!(error = %e, "Schedule sync failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Sync worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
