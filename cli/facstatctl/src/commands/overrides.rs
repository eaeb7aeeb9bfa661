//! Manual override commands.

use anyhow::{bail, Result};
use chrono::Duration;
use clap::{Args, Subcommand};
use facstat_schedule::ManualOverride;

use crate::error::CliError;
use crate::output::print_success;

use super::CommandContext;

/// Override commands.
#[derive(Debug, Args)]
pub struct OverrideCommand {
    #[command(subcommand)]
    command: OverrideSubcommand,
}

#[derive(Debug, Subcommand)]
enum OverrideSubcommand {
    /// Show a fixed status for a while, regardless of schedule.
    Set(SetOverrideArgs),

    /// Remove an override before it expires.
    Clear(ClearOverrideArgs),
}

#[derive(Debug, Args)]
struct SetOverrideArgs {
    /// Person ID.
    id: String,

    /// Status text to show, e.g. "in a meeting".
    status: String,

    /// How long the override lasts.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10080))]
    minutes: u32,
}

#[derive(Debug, Args)]
struct ClearOverrideArgs {
    /// Person ID.
    id: String,
}

impl OverrideCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            OverrideSubcommand::Set(args) => set_override(ctx, args).await,
            OverrideSubcommand::Clear(args) => clear_override(ctx, args).await,
        }
    }
}

async fn set_override(ctx: CommandContext, args: SetOverrideArgs) -> Result<()> {
    let status = args.status.trim();
    if status.is_empty() {
        bail!("override status must not be blank");
    }

    let expires_at = ctx.now() + Duration::minutes(i64::from(args.minutes));
    let manual = ManualOverride::new(status, expires_at);

    let store = ctx.store()?;
    store
        .set_override(&args.id, &manual)
        .await
        .map_err(CliError::from)?;

    print_success(&format!(
        "'{}' shows \"{}\" until {}",
        args.id,
        status,
        expires_at.with_timezone(&ctx.calendar.offset()).format("%Y-%m-%d %H:%M")
    ));
    Ok(())
}

async fn clear_override(ctx: CommandContext, args: ClearOverrideArgs) -> Result<()> {
    let store = ctx.store()?;
    store
        .clear_override(&args.id)
        .await
        .map_err(CliError::from)?;

    print_success(&format!("Cleared override for '{}'", args.id));
    Ok(())
}
