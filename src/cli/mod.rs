//! CLI parser and dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "regharvest")]
#[command(about = "Regulatory filing harvester for legacy government document portals")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the database, objects, and config file
    #[arg(long, short = 'd', global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, database schema, and config file
    Init,

    /// Run one harvest sweep (reconcile, budget, fetch)
    Sweep,

    /// Sweep historical untracked cases beyond the daily boundary
    Backfill {
        /// Only consider docket cases heard on or after this date (YYYY-MM-DD)
        #[arg(long)]
        min_hearing_date: chrono::NaiveDate,
        /// Maximum cases to attempt
        #[arg(short, long, default_value = "100")]
        limit: u32,
    },

    /// Fetch a single case immediately, bypassing the daily cap
    TestCase {
        /// Docket case number, e.g. "CD 2025-002808"
        case_number: String,
    },

    /// Fetch all documents for one well from the bulk portal
    Well {
        /// Well identifier (API number)
        well_id: String,
        /// Restrict to one form number, e.g. "1002A"
        #[arg(short, long)]
        form: Option<String>,
        /// Source kind tag for downstream routing
        #[arg(short, long, default_value = "completion_report")]
        kind: String,
    },

    /// Show harvest statistics
    Stats,

    /// Start the stats/trigger web server
    Serve {
        /// Bind address (host, port, or host:port)
        #[arg(short, long)]
        bind: Option<String>,
        /// Run a sweep in-process every N minutes
        #[arg(long)]
        sweep_interval_mins: Option<u64>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&settings).await,
        Commands::Sweep => commands::cmd_sweep(&settings).await,
        Commands::Backfill {
            min_hearing_date,
            limit,
        } => commands::cmd_backfill(&settings, min_hearing_date, limit).await,
        Commands::TestCase { case_number } => commands::cmd_test_case(&settings, &case_number).await,
        Commands::Well {
            well_id,
            form,
            kind,
        } => commands::cmd_well(&settings, &well_id, form.as_deref(), &kind).await,
        Commands::Stats => commands::cmd_stats(&settings).await,
        Commands::Serve {
            bind,
            sweep_interval_mins,
        } => commands::cmd_serve(&settings, bind.as_deref(), sweep_interval_mins).await,
    }
}
