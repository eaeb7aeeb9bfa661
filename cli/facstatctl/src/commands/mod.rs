//! CLI commands.

mod overrides;
mod person;
mod status;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use facstat_daemon::store::{RecordStore, SqliteStore};
use facstat_schedule::{Calendar, Clock, SystemClock};

use crate::output::OutputFormat;

/// facstat - manage faculty availability status.
#[derive(Debug, Parser)]
#[command(name = "facstat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Path to the record store.
    #[arg(long, global = true, env = "FACSTAT_DB_PATH", default_value = "./facstat.db")]
    db: PathBuf,

    /// Fixed UTC offset schedules are written in, e.g. +06:00.
    #[arg(long, global = true, env = "FACSTAT_UTC_OFFSET", default_value = "+06:00")]
    utc_offset: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List everyone's current status.
    Status(status::StatusCommand),

    /// Add, edit, inspect or remove people.
    Person(person::PersonCommand),

    /// Set or clear manual status overrides.
    Override(overrides::OverrideCommand),

    /// Merge a schedule file into the store.
    Sync(sync::SyncCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let calendar = Calendar::from_offset_str(&self.utc_offset)
            .with_context(|| format!("invalid --utc-offset {:?}", self.utc_offset))?;

        let ctx = CommandContext {
            db: self.db,
            calendar,
            format: self.format,
            clock: Arc::new(SystemClock),
        };

        match self.command {
            Commands::Status(cmd) => cmd.run(ctx).await,
            Commands::Person(cmd) => cmd.run(ctx).await,
            Commands::Override(cmd) => cmd.run(ctx).await,
            Commands::Sync(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("facstat {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub db: PathBuf,
    pub calendar: Calendar,
    pub format: OutputFormat,
    pub clock: Arc<dyn Clock>,
}

impl CommandContext {
    /// Open the record store.
    pub fn store(&self) -> Result<Arc<dyn RecordStore>> {
        let store = SqliteStore::open(&self.db)
            .with_context(|| format!("failed to open store at {}", self.db.display()))?;
        Ok(Arc::new(store))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
