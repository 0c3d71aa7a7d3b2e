//! Strata CLI tool

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod manifest;

use manifest::Manifest;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about = "Strata asset group CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base directory of the default filesystem IO manager
    #[arg(long, env = "STRATA_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the asset keys a selection resolves to
    Select {
        /// Path to the asset manifest
        manifest: PathBuf,

        /// Selection clauses (e.g. "*orders", "raw>customers+")
        #[arg(required = true)]
        clauses: Vec<String>,
    },

    /// Show the job a selection would build
    Plan {
        /// Path to the asset manifest
        manifest: PathBuf,

        /// Selection clause; repeat to select more (default: all assets)
        #[arg(long = "select")]
        select: Vec<String>,

        /// Name of the job to build
        #[arg(long, default_value = "plan")]
        job: String,
    },

    /// Materialize assets in process
    Materialize {
        /// Path to the asset manifest
        manifest: PathBuf,

        /// Selection clause; repeat to select more (default: all assets)
        #[arg(long = "select")]
        select: Vec<String>,
    },

    /// Show asset lineage
    Lineage {
        /// Path to the asset manifest
        manifest: PathBuf,

        /// Asset key (e.g. "raw>orders")
        name: String,

        /// Show upstream dependencies
        #[arg(long)]
        upstream: bool,

        /// Show downstream dependencies
        #[arg(long)]
        downstream: bool,

        /// Maximum number of hops to follow
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Page through the partitions of a job
    Partitions {
        /// Path to the asset manifest
        manifest: PathBuf,

        /// Job whose partition sets to list
        #[arg(long, default_value = strata_runtime::BASE_JOB_NAME)]
        job: String,

        /// Partition to page from (exclusive)
        #[arg(long)]
        cursor: Option<String>,

        /// Maximum number of partitions to show
        #[arg(long)]
        limit: Option<usize>,

        /// Page backwards from the cursor
        #[arg(long)]
        reverse: bool,
    },
}

impl Commands {
    fn manifest_path(&self) -> &PathBuf {
        match self {
            Commands::Select { manifest, .. }
            | Commands::Plan { manifest, .. }
            | Commands::Materialize { manifest, .. }
            | Commands::Lineage { manifest, .. }
            | Commands::Partitions { manifest, .. } => manifest,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = config::load(cli.storage_dir)?;
    let group = Manifest::load(cli.command.manifest_path())?.to_asset_group(&config)?;

    // Execute command
    match cli.command {
        Commands::Select { clauses, .. } => {
            commands::select::execute(&group, clauses)?;
        }
        Commands::Plan { select, job, .. } => {
            commands::plan::execute(&group, &job, &select)?;
        }
        Commands::Materialize { select, .. } => {
            let succeeded = commands::materialize::execute(&group, &select)?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Lineage {
            name,
            upstream,
            downstream,
            depth,
            ..
        } => {
            commands::lineage::execute(&group, &name, upstream, downstream, depth)?;
        }
        Commands::Partitions {
            job,
            cursor,
            limit,
            reverse,
            ..
        } => {
            commands::partitions::execute(group, &job, cursor.as_deref(), limit, reverse)?;
        }
    }

    Ok(())
}
