//! Periodic status recomputation.
//!
//! Every tick the scheduler reads all records, resolves each one against the
//! current civil time, sweeps expired overrides and writes back any status
//! that changed. Ticks never overlap and a failure on one record never stops
//! the others.

mod recompute;
mod worker;

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

pub use recompute::{RecomputeStats, StatusRecomputer};
pub use worker::SchedulerWorker;

/// Errors that abandon a whole tick.
#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("failed to read records: {0}")]
    Snapshot(#[source] StoreError),
}

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between tick starts.
    pub interval: Duration,

    /// Bound on each store call made during a tick.
    pub store_timeout: Duration,
}
