use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use bugtrail::cli::commands;
use bugtrail::cli::{Cli, Commands};
use bugtrail::core::{Config, Workspace};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let workspace = Workspace::resolve(cli.global.workspace.as_deref()).ok();
    let global = cli
        .global
        .with_config_defaults(&Config::load_for(workspace.as_ref()));

    match cli.command {
        Commands::Init(args) => commands::init::run(args, &global),
        Commands::Project(cmd) => commands::project::run(cmd, &global),
        Commands::Bug(cmd) => commands::bug::run(cmd, &global),
        Commands::Task(cmd) => commands::task::run(cmd, &global),
        Commands::History(cmd) => commands::history::run(cmd, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

/// Log to stderr so stdout stays clean for piping
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("BUGTRAIL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
