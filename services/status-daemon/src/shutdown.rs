//! Bounded shutdown of background workers.

use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, warn};

/// A spawned worker and the name it is logged under.
pub type NamedWorker = (&'static str, JoinHandle<()>);

/// Wait for every worker to finish, sharing one `limit` across all of them.
///
/// Workers still running when the limit passes are aborted. Returns `true`
/// if all of them finished on their own.
pub async fn join_workers(mut workers: Vec<NamedWorker>, limit: Duration) -> bool {
    let joined = tokio::time::timeout(limit, async {
        for (name, handle) in workers.iter_mut() {
            if let Err(e) = handle.await {
                report_join_error(*name, &e);
            }
        }
    })
    .await;

    if joined.is_ok() {
        return true;
    }

    for (name, handle) in &workers {
        if !handle.is_finished() {
            warn!(worker = *name, "Worker did not shut down in time");
            handle.abort();
        }
    }
    false
}

fn report_join_error(name: &str, e: &JoinError) {
    if e.is_panic() {
        error!(worker = name, error = %e, "Worker task panicked");
    } else {
        warn!(worker = name, error = %e, "Worker task was cancelled");
    }
}
