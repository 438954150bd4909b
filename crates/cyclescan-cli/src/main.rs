//! cyclescan — burn-rate and runway reports over recorded balance snapshots.
//!
//! # Usage
//!
//! ```text
//! cyclescan import --entities registry.json --snapshots history.json
//! cyclescan leaderboard --limit 20
//! cyclescan projects openchat --all
//! cyclescan estimate ryjl3-tyaaa-aaaaa-aaaba-cai --format json
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

mod commands;

use commands::{Context, OutputFormat};

#[derive(Parser)]
#[command(
    name = "cyclescan",
    about = "CycleScan — top-up aware cycle burn estimation",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to cyclescan.toml (default: ./cyclescan.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the store; overrides [store].path's directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Evaluate as of this instant (ms since epoch) instead of the clock.
    #[arg(long, global = true)]
    now: Option<u64>,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load entity metadata and/or snapshots from JSON array files.
    Import {
        /// `[{"entity_id": "...", "group": "...", "website": "...", "valid": true}]`
        #[arg(long)]
        entities: Option<PathBuf>,
        /// `[{"entity_id": "...", "timestamp": 0, "balance": 0}]`
        #[arg(long)]
        snapshots: Option<PathBuf>,
    },
    /// Record one balance observation.
    Record {
        entity: String,
        balance: u128,
        /// Timestamp in ms (default: now).
        #[arg(long)]
        at: Option<u64>,
    },
    /// Rates for every window plus the runway of one entity.
    Estimate { entity: String },
    /// Entities ranked by burn rate.
    Leaderboard {
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Page size (default: [leaderboard].page_limit, max 1000).
        #[arg(long)]
        limit: Option<usize>,
        /// Include entities flagged invalid.
        #[arg(long)]
        all: bool,
    },
    /// Groups ranked by summed burn rate, or one group's members.
    Projects {
        /// List this group's members instead of ranking groups.
        group: Option<String>,
        /// Include members flagged invalid in the sums.
        #[arg(long)]
        all: bool,
    },
    /// Change an entity's group or website; an empty value clears it.
    Update {
        entity: String,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        website: Option<String>,
    },
    /// Flag an entity valid or invalid.
    SetValid {
        entity: String,
        #[arg(action = ArgAction::Set)]
        valid: bool,
    },
    /// Remove entities and their snapshot history.
    Remove {
        #[arg(required = true)]
        entities: Vec<String>,
    },
    /// Delete snapshots older than the retention period.
    Prune {
        /// Retention in days (default: [retention].days).
        #[arg(long)]
        days: Option<u64>,
    },
    /// Store counts.
    Stats,
    /// Dump the registry with each entity's latest snapshot as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,cyclescan=debug"
    } else {
        "warn,cyclescan=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let ctx = Context::open(
        cli.config.as_deref(),
        cli.data_dir.as_deref(),
        cli.format,
        cli.now,
    )?;

    match cli.command {
        Commands::Import {
            entities,
            snapshots,
        } => commands::import::run(&ctx, entities.as_deref(), snapshots.as_deref()),
        Commands::Record {
            entity,
            balance,
            at,
        } => commands::record::run(&ctx, &entity, balance, at),
        Commands::Estimate { entity } => commands::estimate::run(&ctx, &entity),
        Commands::Leaderboard { offset, limit, all } => {
            commands::leaderboard::run(&ctx, offset, limit, all).await
        }
        Commands::Projects { group: None, all } => commands::projects::run(&ctx, all).await,
        Commands::Projects {
            group: Some(group),
            all,
        } => commands::projects::members(&ctx, &group, all).await,
        Commands::Update {
            entity,
            group,
            website,
        } => commands::admin::update(&ctx, &entity, group, website),
        Commands::SetValid { entity, valid } => commands::admin::set_valid(&ctx, &entity, valid),
        Commands::Remove { entities } => commands::admin::remove(&ctx, &entities),
        Commands::Prune { days } => commands::admin::prune(&ctx, days),
        Commands::Stats => commands::admin::stats(&ctx),
        Commands::Export { output } => commands::export::run(&ctx, output.as_deref()),
    }
}
