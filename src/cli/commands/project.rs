//! `bugtrail project` command - Project management

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{
    apply_and_record, format_short_id, load_entity, open_recorder, resolve_typed_id, save_entity,
    workspace,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::Config;
use crate::entities::Project;
use crate::history::ChangeType;

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a new project
    New(NewArgs),

    /// Show a project's details
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Project name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Longer description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Target completion date (YYYY-MM-DD)
    #[arg(long)]
    pub deadline: Option<NaiveDate>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Project ID (full or unique prefix)
    pub id: String,
}

pub fn run(cmd: ProjectCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ProjectCommands::New(args) => run_new(args, global),
        ProjectCommands::Show(args) => run_show(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let recorder = open_recorder(&ws, &config)?;

    let mut project = Project::new(
        EntityId::new(EntityPrefix::Proj),
        args.name,
        config.author(),
        Utc::now(),
    );
    project.description = args.description;
    project.deadline = args.deadline;

    let path = apply_and_record(
        &recorder,
        &project,
        "create_project",
        ChangeType::Create,
        global,
        || save_entity(&ws, &project),
    )?;

    if global.quiet {
        println!("{}", project.id);
    } else {
        println!(
            "{} Created project {}",
            style("✓").green(),
            style(format_short_id(&project.id)).cyan()
        );
        println!("   {}", style(path.display()).dim());
        println!("   {}", style(&project.name).white());
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let id = resolve_typed_id(&ws, &args.id, EntityPrefix::Proj)?;
    let (project, _) = load_entity::<Project>(&ws, &id)?;

    match global.output_format() {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&project).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            println!(
                "{}\t{}\t{}",
                project.id,
                project.name,
                project.deadline.map(|d| d.to_string()).unwrap_or_default()
            );
        }
        OutputFormat::Yaml | OutputFormat::Auto => {
            print!("{}", serde_yml::to_string(&project).into_diagnostic()?);
        }
    }
    Ok(())
}
