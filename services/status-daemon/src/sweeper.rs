//! Clearing of expired manual overrides.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{with_timeout, RecordStore, StoreResult};

/// Clears overrides the resolver found expired.
///
/// A failed sweep is not retried here. The override stays in the store, the
/// next tick sees it expired again and sweeps again.
#[derive(Clone)]
pub struct OverrideSweeper {
    store: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl OverrideSweeper {
    pub fn new(store: Arc<dyn RecordStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Clear the override for `person_id`. Idempotent.
    pub async fn sweep(&self, person_id: &str) -> StoreResult<()> {
        match with_timeout(self.timeout, self.store.clear_override(person_id)).await {
            Ok(()) => {
                info!(person_id = %person_id, "Cleared expired override");
                Ok(())
            }
            Err(e) => {
                warn!(person_id = %person_id, error = %e, "Failed to clear expired override");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use facstat_schedule::{ManualOverride, PersonRecord};

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_records([PersonRecord::new("p1", now)
            .with_override(ManualOverride::new("away", now - ChronoDuration::minutes(1)))]));
        let sweeper = OverrideSweeper::new(store.clone(), Duration::from_secs(1));

        sweeper.sweep("p1").await.unwrap();
        sweeper.sweep("p1").await.unwrap();
        sweeper.sweep("nobody").await.unwrap();

        assert!(store.snapshot().await["p1"].manual_override.is_none());
    }

    #[tokio::test]
    async fn test_sweep_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.fail_override_clears_for("p1");
        let sweeper = OverrideSweeper::new(store, Duration::from_secs(1));

        assert!(sweeper.sweep("p1").await.is_err());
    }
}
