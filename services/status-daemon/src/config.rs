//! Configuration for the status daemon.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use facstat_schedule::Calendar;

use crate::scheduler::SchedulerConfig;

/// Status daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite store path.
    pub db_path: PathBuf,

    /// JSON schedule file merged into the store.
    pub schedule_path: PathBuf,

    /// Recompute period.
    pub tick_interval: Duration,

    /// How often the schedule file is checked for changes.
    pub sync_interval: Duration,

    /// Bound on each store call made by the workers.
    pub store_timeout: Duration,

    /// How long shutdown waits for each worker.
    pub shutdown_timeout: Duration,

    /// Civil zone the schedules are written in.
    pub calendar: Calendar,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("FACSTAT_DB_PATH")
            .unwrap_or_else(|| "./facstat.db".to_string())
            .into();

        let schedule_path = lookup("FACSTAT_SCHEDULE_PATH")
            .unwrap_or_else(|| "./schedule.json".to_string())
            .into();

        let tick_interval_secs = parse_or(&lookup, "FACSTAT_TICK_INTERVAL_SECS", 5)?;
        if tick_interval_secs == 0 {
            bail!("FACSTAT_TICK_INTERVAL_SECS must be greater than zero");
        }

        let sync_interval_secs = parse_or(&lookup, "FACSTAT_SYNC_INTERVAL_SECS", 30)?;
        if sync_interval_secs == 0 {
            bail!("FACSTAT_SYNC_INTERVAL_SECS must be greater than zero");
        }

        let store_timeout_ms = parse_or(&lookup, "FACSTAT_STORE_TIMEOUT_MS", 2000)?;
        let shutdown_timeout_secs = parse_or(&lookup, "FACSTAT_SHUTDOWN_TIMEOUT_SECS", 10)?;

        let offset = lookup("FACSTAT_UTC_OFFSET").unwrap_or_else(|| "+06:00".to_string());
        let calendar = Calendar::from_offset_str(&offset).context("invalid FACSTAT_UTC_OFFSET")?;

        let log_level = lookup("FACSTAT_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            db_path,
            schedule_path,
            tick_interval: Duration::from_secs(tick_interval_secs),
            sync_interval: Duration::from_secs(sync_interval_secs),
            store_timeout: Duration::from_millis(store_timeout_ms),
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
            calendar,
            log_level,
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.tick_interval,
            store_timeout: self.store_timeout,
        }
    }
}

fn parse_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
        None => Ok(default),
    }
}
