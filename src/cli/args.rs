//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::Config;

use crate::cli::commands::{
    bug::BugCommands, completions::CompletionsArgs, history::HistoryCommands, init::InitArgs,
    project::ProjectCommands, task::TaskCommands,
};

#[derive(Parser)]
#[command(name = "bugtrail")]
#[command(author, version, about = "Bug and task tracking with an audit trail")]
#[command(long_about = "Tracks projects, bugs and tasks as plain YAML files and records every change into an append-only history log.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format (default: `default_format` from config, else auto)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .bugtrail/)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
}

impl GlobalOpts {
    /// The format to print in
    pub fn output_format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Take the format from config when `--format` was not given
    pub fn with_config_defaults(mut self, config: &Config) -> Self {
        if self.format.is_none() {
            self.format = config.default_format.as_deref().and_then(|name| {
                match OutputFormat::from_str(name, true) {
                    Ok(format) => Some(format),
                    Err(_) => {
                        tracing::warn!(value = name, "ignoring unknown default_format");
                        None
                    }
                }
            });
        }
        self
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new bugtrail workspace
    Init(InitArgs),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Bug management
    #[command(subcommand)]
    Bug(BugCommands),

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Inspect the recorded change history of an entity
    #[command(subcommand)]
    History(HistoryCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, table for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Tab-separated values (for piping)
    Tsv,
}
