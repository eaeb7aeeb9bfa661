//! facstat status daemon
//!
//! Keeps each person's stored availability status current. On startup the
//! schedule file is merged into the store; afterwards a sync worker watches
//! the file for changes and a scheduler worker recomputes statuses.

use std::sync::Arc;

use anyhow::{Context, Result};
use facstat_daemon::{
    config::Config,
    scheduler::{SchedulerWorker, StatusRecomputer},
    shutdown::join_workers,
    source::{JsonFileSource, ScheduleSource},
    store::{RecordStore, SqliteStore},
    sync::{SyncOutcome, SyncWorker, Synchronizer},
};
use facstat_schedule::{Clock, SystemClock};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to FACSTAT_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting facstat status daemon");
    info!(
        db_path = %config.db_path.display(),
        schedule_path = %config.schedule_path.display(),
        utc_offset = %config.calendar.offset(),
        "Configuration loaded"
    );

    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteStore::open(&config.db_path)
            .with_context(|| format!("failed to open store at {}", config.db_path.display()))?,
    );
    let source: Arc<dyn ScheduleSource> = Arc::new(JsonFileSource::new(&config.schedule_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let synchronizer = Synchronizer::new(
        Arc::clone(&source),
        Arc::clone(&store),
        Arc::clone(&clock),
        config.store_timeout,
    );

    // Reconcile before the first tick. A missing or broken file is not fatal;
    // the sync worker keeps retrying.
    match synchronizer.sync_if_changed().await {
        Ok(SyncOutcome::UpToDate) => info!("Schedule source already synced"),
        Ok(SyncOutcome::Merged { marker, .. }) => info!(marker = %marker, "Initial sync complete"),
        Err(e) => warn!(error = %e, "Initial sync failed"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = config.scheduler();
    let recomputer = StatusRecomputer::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        config.calendar,
        scheduler.store_timeout,
    );
    let scheduler_worker = SchedulerWorker::new(recomputer, scheduler.interval);
    let scheduler_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            scheduler_worker.run(shutdown_rx).await;
        }
    });

    let sync_worker = SyncWorker::new(synchronizer, config.sync_interval);
    let sync_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            sync_worker.run(shutdown_rx).await;
        }
    });

    shutdown_signal().await;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let workers = vec![("scheduler", scheduler_handle), ("sync", sync_handle)];
    join_workers(workers, config.shutdown_timeout).await;

    info!("Status daemon shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
