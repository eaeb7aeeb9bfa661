//! One-shot schedule sync.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use facstat_daemon::source::JsonFileSource;
use facstat_daemon::sync::{SyncOutcome, Synchronizer};
use facstat_reconcile::MergeStats;
use serde::Serialize;

use crate::output::{print_info, print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Merge a schedule file into the store.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Schedule JSON file.
    path: PathBuf,

    /// Merge even if the file has not changed since the last sync.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncReport {
    merged: bool,
    marker: Option<String>,
    inserted: usize,
    updated: usize,
    unchanged: usize,
    skipped: usize,
    rejected: usize,
}

impl SyncReport {
    fn new(outcome: &SyncOutcome) -> Self {
        let (marker, stats) = match outcome {
            SyncOutcome::UpToDate => (None, MergeStats::default()),
            SyncOutcome::Merged { marker, stats } => (Some(marker.clone()), *stats),
        };
        Self {
            merged: marker.is_some(),
            marker,
            inserted: stats.inserted,
            updated: stats.updated,
            unchanged: stats.unchanged,
            skipped: stats.skipped,
            rejected: stats.rejected,
        }
    }
}

impl SyncCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let synchronizer = Synchronizer::new(
            Arc::new(JsonFileSource::new(&self.path)),
            ctx.store()?,
            Arc::clone(&ctx.clock),
            STORE_TIMEOUT,
        );
        let outcome = synchronizer.sync(self.force).await?;
        let report = SyncReport::new(&outcome);

        match ctx.format {
            OutputFormat::Json => print_single(&report),
            OutputFormat::Table if !report.merged => {
                print_info("Schedule file unchanged since last sync; use --force to merge anyway")
            }
            OutputFormat::Table => {
                print_success(&format!(
                    "Merged {}: {} added, {} updated, {} unchanged",
                    self.path.display(),
                    report.inserted,
                    report.updated,
                    report.unchanged
                ));
                if report.skipped > 0 {
                    print_info(&format!(
                        "{} entries without an id or name were skipped",
                        report.skipped
                    ));
                }
                if report.rejected > 0 {
                    print_warning(&format!(
                        "{} malformed entries were skipped",
                        report.rejected
                    ));
                }
            }
        }
        Ok(())
    }
}
