//! # FoodData Sync CLI (`fdsync`)
//!
//! The `fdsync` binary drives the reference-data ingestion pipeline: it
//! pulls the provider's food-composition catalog page by page, normalizes
//! each record into the ingredient schema, and upserts the results into
//! the local store — checkpointing as it goes so a multi-week run can be
//! interrupted and resumed at the exact page it left off.
//!
//! ## Usage
//!
//! ```bash
//! fdsync --config ./config/fdsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fdsync init` | Create the SQLite database and ingredient schema |
//! | `fdsync run` | Start ingestion (continues a checkpointed run if one exists) |
//! | `fdsync resume` | Explicitly continue an interrupted run |
//! | `fdsync status` | Print progress, counters, ETA, and the error log |
//! | `fdsync reset` | Delete the checkpoint so the next run starts fresh |
//! | `fdsync get <id>` | Print one stored ingredient by external id |
//! | `fdsync probe <id>` | Fetch one record from the provider and print its normalized form |
//!
//! The provider credential is read from the `FDC_API_KEY` environment
//! variable; throughput tuning (requests per hour, page size, batch
//! size) lives in the config file.

mod checkpoint;
mod config;
mod db;
mod fetch;
mod get;
mod ingest;
mod load;
mod migrate;
mod models;
mod probe;
mod progress;
mod status;
mod transform;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::progress::ProgressMode;

/// FoodData Sync — a checkpointed, rate-limited ingestion pipeline for
/// food-composition reference data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fdsync.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fdsync",
    about = "FoodData Sync — checkpointed, rate-limited food-composition ingestion",
    version,
    long_about = "FoodData Sync pulls a provider's full food-composition catalog through a \
    rate-limited paginated API, normalizes heterogeneous nutrient records into a fixed \
    ingredient schema, and loads them into a local SQLite store with idempotent upserts. \
    Progress is checkpointed continuously, so runs survive throttling, interruption, and \
    process restarts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fdsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the ingredient database schema.
    ///
    /// Creates the SQLite database file and the ingredients table with
    /// its unique external-id key. Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Start ingestion.
    ///
    /// Counts each configured partition for an ETA estimate, then walks
    /// every partition page by page: fetch, normalize, batch-upsert,
    /// checkpoint. If a checkpoint already exists the run continues from
    /// it rather than double-counting from scratch.
    Run {
        /// Progress output: auto, off, human, or json.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Continue an interrupted run from its checkpoint.
    ///
    /// Identical to `run` except that a missing checkpoint is an error —
    /// a silently restarted multi-week run is worse than a loud one.
    Resume {
        /// Progress output: auto, off, human, or json.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Show ingestion progress from the last checkpoint.
    ///
    /// Read-only: reports processed/total counts, percent complete,
    /// insert and duplicate counters, ETA, and the tail of the error
    /// log. Never touches the network.
    Status,

    /// Delete the checkpoint so the next run starts from scratch.
    ///
    /// The ingredient store itself is untouched — re-running over
    /// existing rows updates them in place.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Print one stored ingredient by its external id.
    Get {
        /// Provider external id (fdcId).
        external_id: i64,
    },

    /// Fetch one record from the provider and print its normalized form
    /// without writing to the database.
    Probe {
        /// Provider external id (fdcId).
        external_id: i64,
    },
}

fn parse_progress(mode: &str) -> anyhow::Result<ProgressMode> {
    match mode {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "off" => Ok(ProgressMode::Off),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        other => anyhow::bail!(
            "Unknown progress mode: '{}'. Must be auto, off, human, or json.",
            other
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run { progress } => {
            let reporter = parse_progress(&progress)?.reporter();
            ingest::run_ingest(&cfg, false, reporter.as_ref()).await?;
        }
        Commands::Resume { progress } => {
            let reporter = parse_progress(&progress)?.reporter();
            ingest::run_ingest(&cfg, true, reporter.as_ref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
        Commands::Reset { yes } => {
            checkpoint::run_reset(&cfg, yes)?;
        }
        Commands::Get { external_id } => {
            get::run_get(&cfg, external_id).await?;
        }
        Commands::Probe { external_id } => {
            probe::run_probe(&cfg, external_id).await?;
        }
    }

    Ok(())
}
