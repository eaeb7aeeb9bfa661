//! Person commands.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use facstat_daemon::store::PersonPatch;
use facstat_schedule::{validate, PersonRecord, ScheduleIssue};
use serde::Serialize;

use crate::error::CliError;
use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

/// Person commands.
#[derive(Debug, Args)]
pub struct PersonCommand {
    #[command(subcommand)]
    command: PersonSubcommand,
}

#[derive(Debug, Subcommand)]
enum PersonSubcommand {
    /// Start tracking a person.
    Add(AddPersonArgs),

    /// Change a person's name, precedence or schedule.
    Edit(EditPersonArgs),

    /// Show a person's record and any malformed schedule entries.
    Show(PersonIdArgs),

    /// Stop tracking a person.
    Delete(PersonIdArgs),
}

#[derive(Debug, Args)]
struct AddPersonArgs {
    /// Person ID.
    id: String,

    /// Display name.
    #[arg(long)]
    name: Option<String>,

    /// Listing order; lower comes first.
    #[arg(long)]
    precedence: Option<i32>,
}

#[derive(Debug, Args)]
struct EditPersonArgs {
    /// Person ID.
    id: String,

    /// Display name.
    #[arg(long)]
    name: Option<String>,

    /// Listing order; lower comes first.
    #[arg(long)]
    precedence: Option<i32>,

    /// JSON file with any of `weekendDays`, `officeHours`, `classTimes`.
    #[arg(long)]
    schedule: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PersonIdArgs {
    /// Person ID.
    id: String,
}

impl PersonCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            PersonSubcommand::Add(args) => add_person(ctx, args).await,
            PersonSubcommand::Edit(args) => edit_person(ctx, args).await,
            PersonSubcommand::Show(args) => show_person(ctx, args).await,
            PersonSubcommand::Delete(args) => delete_person(ctx, args).await,
        }
    }
}

/// Record plus its schedule problems, as shown by `person show`.
#[derive(Debug, Serialize)]
struct PersonDetails<'a> {
    #[serde(flatten)]
    record: &'a PersonRecord,
    issues: Vec<ScheduleIssue>,
}

async fn add_person(ctx: CommandContext, args: AddPersonArgs) -> Result<()> {
    let id = args.id.trim();
    if id.is_empty() {
        bail!("person ID must not be blank");
    }

    let mut record = PersonRecord::new(id, ctx.now());
    record.name = args.name;
    if let Some(precedence) = args.precedence {
        record.schedule.precedence = precedence;
    }

    let store = ctx.store()?;
    store.insert(&record).await.map_err(CliError::from)?;

    print_success(&format!("Added '{}'", record.id));
    Ok(())
}

/// Build the patch an edit applies. Flags win over the schedule file.
fn edit_patch(args: &EditPersonArgs, schedule: Option<&str>) -> Result<PersonPatch> {
    let mut patch = match schedule {
        Some(json) => {
            let patch: PersonPatch =
                serde_json::from_str(json).context("schedule file is not a valid schedule")?;
            patch
        }
        None => PersonPatch::default(),
    };
    if args.name.is_some() {
        patch.name = args.name.clone();
    }
    if args.precedence.is_some() {
        patch.precedence = args.precedence;
    }
    if patch.is_empty() {
        bail!("nothing to change; pass --name, --precedence or --schedule");
    }
    Ok(patch)
}

async fn edit_person(ctx: CommandContext, args: EditPersonArgs) -> Result<()> {
    let schedule = match &args.schedule {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let patch = edit_patch(&args, schedule.as_deref())?;

    let store = ctx.store()?;
    if store.get(&args.id).await.map_err(CliError::from)?.is_none() {
        return Err(CliError::NotFound(args.id).into());
    }
    store
        .upsert(&args.id, &patch, ctx.now())
        .await
        .map_err(CliError::from)?;

    print_success(&format!("Updated '{}'", args.id));
    Ok(())
}

async fn show_person(ctx: CommandContext, args: PersonIdArgs) -> Result<()> {
    let store = ctx.store()?;
    let record = store
        .get(&args.id)
        .await
        .map_err(CliError::from)?
        .ok_or_else(|| CliError::NotFound(args.id.clone()))?;

    let details = PersonDetails {
        issues: validate(&record.schedule),
        record: &record,
    };
    print_single(&details);

    if ctx.format == OutputFormat::Table {
        for issue in &details.issues {
            print_warning(&format!("{issue} is ignored"));
        }
    }
    Ok(())
}

async fn delete_person(ctx: CommandContext, args: PersonIdArgs) -> Result<()> {
    let store = ctx.store()?;
    if !store.delete(&args.id).await.map_err(CliError::from)? {
        return Err(CliError::NotFound(args.id).into());
    }

    print_success(&format!("Deleted '{}'", args.id));
    Ok(())
}
