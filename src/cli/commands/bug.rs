//! `bugtrail bug` command - Bug tracking

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{
    apply_and_record, format_short_id, load_entity, open_recorder, resolve_typed_id, save_entity,
    truncate_str, workspace,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::{BugStatus, Priority};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::Config;
use crate::entities::{Bug, Project};
use crate::history::ChangeType;

#[derive(Subcommand, Debug)]
pub enum BugCommands {
    /// Report a new bug
    New(NewArgs),

    /// Show a bug's details
    Show(ShowArgs),

    /// Change a bug's status
    Status(StatusArgs),

    /// Delete a bug (its history is kept)
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Project the bug belongs to (ID or unique prefix)
    #[arg(long, short = 'p')]
    pub project: String,

    /// Bug title
    #[arg(long, short = 't')]
    pub title: String,

    /// Priority (low/medium/high)
    #[arg(long, default_value = "medium")]
    pub priority: Priority,

    /// Steps to reproduce
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Person to assign
    #[arg(long, short = 'a')]
    pub assignee: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Bug ID (full or unique prefix)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Bug ID (full or unique prefix)
    pub id: String,

    /// New status (opened/in-progress/closed)
    pub status: BugStatus,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Bug ID (full or unique prefix)
    pub id: String,
}

pub fn run(cmd: BugCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BugCommands::New(args) => run_new(args, global),
        BugCommands::Show(args) => run_show(args, global),
        BugCommands::Status(args) => run_status(args, global),
        BugCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));

    let project_id = resolve_typed_id(&ws, &args.project, EntityPrefix::Proj)?;
    // Fails early if the project file is missing
    load_entity::<Project>(&ws, &project_id)?;

    let recorder = open_recorder(&ws, &config)?;

    let mut bug = Bug::new(
        EntityId::new(EntityPrefix::Bug),
        project_id,
        args.title,
        config.author(),
        Utc::now(),
    );
    bug.priority = args.priority;
    bug.description = args.description;
    bug.assignee = args.assignee;

    let path = apply_and_record(&recorder, &bug, "create_bug", ChangeType::Create, global, || {
        save_entity(&ws, &bug)
    })?;

    if global.quiet {
        println!("{}", bug.id);
    } else {
        let priority_styled = match bug.priority {
            Priority::High => style(bug.priority.to_string()).red().bold(),
            Priority::Medium => style(bug.priority.to_string()).yellow(),
            Priority::Low => style(bug.priority.to_string()).white(),
        };
        println!(
            "{} Created bug {}",
            style("✓").green(),
            style(format_short_id(&bug.id)).cyan()
        );
        println!("   {}", style(path.display()).dim());
        println!(
            "   {} | {}",
            priority_styled,
            style(truncate_str(&bug.title, 60)).white()
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let id = resolve_typed_id(&ws, &args.id, EntityPrefix::Bug)?;
    let (bug, _) = load_entity::<Bug>(&ws, &id)?;

    match global.output_format() {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&bug).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            println!("{}\t{}\t{}\t{}", bug.id, bug.status, bug.priority, bug.title);
        }
        OutputFormat::Yaml | OutputFormat::Auto => {
            print!("{}", serde_yml::to_string(&bug).into_diagnostic()?);
        }
    }
    Ok(())
}

fn run_status(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = resolve_typed_id(&ws, &args.id, EntityPrefix::Bug)?;
    let (mut bug, _) = load_entity::<Bug>(&ws, &id)?;

    if bug.status == args.status {
        if !global.quiet {
            println!(
                "{} {} is already {}",
                style("!").yellow(),
                format_short_id(&bug.id),
                bug.status
            );
        }
        return Ok(());
    }

    let recorder = open_recorder(&ws, &config)?;
    let previous = bug.status;
    bug.status = args.status;
    apply_and_record(&recorder, &bug, "update_bug_status", ChangeType::Update, global, || {
        save_entity(&ws, &bug)
    })?;

    if !global.quiet {
        println!(
            "{} {} {} -> {}",
            style("✓").green(),
            style(format_short_id(&bug.id)).cyan(),
            previous,
            style(bug.status).yellow()
        );
    }
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = resolve_typed_id(&ws, &args.id, EntityPrefix::Bug)?;
    let (bug, path) = load_entity::<Bug>(&ws, &id)?;

    let recorder = open_recorder(&ws, &config)?;
    // The snapshot is the last state the bug had before removal
    apply_and_record(&recorder, &bug, "delete_bug", ChangeType::Delete, global, || {
        std::fs::remove_file(&path).into_diagnostic()
    })?;

    if !global.quiet {
        println!(
            "{} Deleted bug {}",
            style("✓").green(),
            style(format_short_id(&bug.id)).cyan()
        );
    }
    Ok(())
}
