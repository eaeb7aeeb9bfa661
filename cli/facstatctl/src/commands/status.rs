//! Status listing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use facstat_schedule::{resolve, PersonRecord, Status};
use serde::Serialize;
use tabled::Tabled;

use crate::error::CliError;
use crate::output::print_output;

use super::CommandContext;

/// List people with their status.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Resolve status now instead of showing what the daemon last stored.
    #[arg(long)]
    live: bool,
}

/// One row of the status listing.
#[derive(Debug, Clone, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Room")]
    room: String,

    #[tabled(rename = "Batch")]
    batch: String,

    #[tabled(rename = "Override Until")]
    override_until: String,

    #[tabled(rename = "Precedence")]
    precedence: i32,
}

fn dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

impl StatusRow {
    fn new(record: &PersonRecord, status: &Status, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.display_name().to_string(),
            status: status.label().to_string(),
            room: dash(status.room()),
            batch: dash(status.batch()),
            override_until: record
                .active_override(now)
                .map(|o| o.expires_at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            precedence: record.schedule.precedence,
        }
    }
}

impl StatusCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let store = ctx.store()?;
        let records = store.list_all().await.map_err(CliError::from)?;

        let now = ctx.calendar.now(ctx.clock.as_ref());
        let rows: Vec<StatusRow> = records
            .iter()
            .map(|record| {
                if self.live {
                    StatusRow::new(record, &resolve(record, &now).status, now.instant)
                } else {
                    StatusRow::new(record, &record.status, now.instant)
                }
            })
            .collect();

        print_output(&rows, ctx.format);
        Ok(())
    }
}
