//! `bugtrail task` command - Task management

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    apply_and_record, format_short_id, load_entity, open_recorder, resolve_typed_id, save_entity,
    workspace,
};
use crate::cli::GlobalOpts;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::Config;
use crate::entities::{Project, Task};
use crate::history::ChangeType;

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    New(NewArgs),

    /// Mark a task as done
    Done(DoneArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Project the task belongs to (ID or unique prefix)
    #[arg(long, short = 'p')]
    pub project: String,

    /// Task title
    #[arg(long, short = 't')]
    pub title: String,
}

#[derive(clap::Args, Debug)]
pub struct DoneArgs {
    /// Task ID (full or unique prefix)
    pub id: String,
}

pub fn run(cmd: TaskCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TaskCommands::New(args) => run_new(args, global),
        TaskCommands::Done(args) => run_done(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let project_id = resolve_typed_id(&ws, &args.project, EntityPrefix::Proj)?;
    load_entity::<Project>(&ws, &project_id)?;
    let recorder = open_recorder(&ws, &config)?;

    let task = Task::new(
        EntityId::new(EntityPrefix::Task),
        project_id,
        args.title,
        config.author(),
        Utc::now(),
    );
    apply_and_record(&recorder, &task, "create_task", ChangeType::Create, global, || {
        save_entity(&ws, &task)
    })?;

    if global.quiet {
        println!("{}", task.id);
    } else {
        println!(
            "{} Created task {}",
            style("✓").green(),
            style(format_short_id(&task.id)).cyan()
        );
    }
    Ok(())
}

fn run_done(args: DoneArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = resolve_typed_id(&ws, &args.id, EntityPrefix::Task)?;
    let (mut task, _) = load_entity::<Task>(&ws, &id)?;

    if task.done {
        if !global.quiet {
            println!("{} {} is already done", style("!").yellow(), format_short_id(&task.id));
        }
        return Ok(());
    }

    let recorder = open_recorder(&ws, &config)?;
    task.done = true;
    apply_and_record(&recorder, &task, "complete_task", ChangeType::Update, global, || {
        save_entity(&ws, &task)
    })?;

    if !global.quiet {
        println!("{} Completed {}", style("✓").green(), style(format_short_id(&task.id)).cyan());
    }
    Ok(())
}
