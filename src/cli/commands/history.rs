//! `bugtrail history` command - Inspect recorded entity history

use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{open_store, truncate_str, workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::history::{HistoryQuery, StoredRecord, TimeRange};

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List an entity's recorded changes, oldest first
    List(ListArgs),

    /// Show the most recent record for an entity
    Latest(LatestArgs),

    /// Show a single record by sequence number
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Entity ID (full, or unique prefix of an existing entity)
    pub id: String,

    /// Only records made at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_time)]
    pub since: Option<DateTime<Utc>>,

    /// Only records made at or before this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_time)]
    pub until: Option<DateTime<Utc>>,

    /// Show at most this many records
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct LatestArgs {
    /// Entity ID (full, or unique prefix of an existing entity)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Entity ID (full, or unique prefix of an existing entity)
    pub id: String,

    /// Record sequence number (as shown by `history list`)
    pub seq: u64,
}

pub fn run(cmd: HistoryCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        HistoryCommands::List(args) => run_list(args, global),
        HistoryCommands::Latest(args) => run_latest(args, global),
        HistoryCommands::Show(args) => run_show(args, global),
    }
}

/// Accept a full RFC 3339 timestamp or a bare date (midnight UTC)
fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid time '{}': use RFC 3339 or YYYY-MM-DD", s))
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = ws.resolve_id(&args.id).map_err(|e| miette::miette!("{}", e))?;
    let store = open_store(&ws, &config)?;

    let range = match (args.since, args.until) {
        (Some(from), Some(to)) => TimeRange::between(from, to),
        (Some(from), None) => TimeRange::since(from),
        (None, Some(to)) => TimeRange::until(to),
        (None, None) => TimeRange::all(),
    };

    let history = store.query_by_entity(&id, range);
    let records: Vec<StoredRecord> = history
        .iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .collect::<Result<_, _>>()
        .map_err(|e| miette::miette!("{}", e))?;

    match global.output_format() {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&records).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            for stored in &records {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    stored.id.sequence(),
                    stored.record.timestamp().to_rfc3339(),
                    stored.record.change_type(),
                    stored.record.action_name(),
                    stored.record.status(),
                    stored.record.snapshot().digest()
                );
            }
        }
        OutputFormat::Auto => {
            if records.is_empty() {
                if !global.quiet {
                    println!("No history recorded for {}", style(&id).cyan());
                }
                return Ok(());
            }
            let mut builder = Builder::default();
            builder.push_record(["SEQ", "TIME", "CHANGE", "ACTION", "STATUS", "DIGEST"]);
            for stored in &records {
                builder.push_record([
                    stored.id.sequence().to_string(),
                    stored.record.timestamp().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                    stored.record.change_type().to_string(),
                    truncate_str(stored.record.action_name(), 32),
                    stored.record.status().to_string(),
                    stored.record.snapshot().digest()[..12].to_string(),
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
            if !global.quiet {
                println!();
                println!("{} record(s) for {}", records.len(), style(&id).cyan());
            }
        }
    }
    Ok(())
}

fn run_latest(args: LatestArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = ws.resolve_id(&args.id).map_err(|e| miette::miette!("{}", e))?;
    let store = open_store(&ws, &config)?;

    let stored = store
        .latest(&id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("No history recorded for {}", id))?;
    print_record(&stored, global)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = workspace(global)?;
    let config = Config::load_for(Some(&ws));
    let id = ws.resolve_id(&args.id).map_err(|e| miette::miette!("{}", e))?;
    let store = open_store(&ws, &config)?;

    let history = store.query_by_entity(&id, TimeRange::all());
    for stored in history.iter() {
        let stored = stored.map_err(|e| miette::miette!("{}", e))?;
        if stored.id.sequence() == args.seq {
            return print_record(&stored, global);
        }
    }
    Err(miette::miette!("No record #{} for {}", args.seq, id))
}

fn print_record(stored: &StoredRecord, global: &GlobalOpts) -> Result<()> {
    let record = &stored.record;
    match global.output_format() {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stored).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(stored).into_diagnostic()?);
        }
        OutputFormat::Tsv => {
            println!(
                "{}\t{}\t{}\t{}",
                stored.id.sequence(),
                record.change_type(),
                record.action_name(),
                record.snapshot().canonical_json()
            );
        }
        OutputFormat::Auto => {
            println!("{} {}", style("Record").bold(), style(stored.id).cyan());
            println!("  entity:     {}", record.entity_id());
            println!("  action:     {} ({})", record.action_name(), record.status());
            println!("  change:     {}", record.change_type());
            println!("  timestamp:  {}", record.timestamp().to_rfc3339());
            println!("  key:        {}", stored.idempotency_key);
            println!("  digest:     {}", record.snapshot().digest());
            println!();
            println!(
                "{}",
                serde_json::to_string_pretty(record.snapshot().body()).into_diagnostic()?
            );
        }
    }
    Ok(())
}
