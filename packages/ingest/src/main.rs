#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the penalty report dataset loader.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use penalty_report_database::{DEFAULT_DB_PATH, open_db, queries};
use penalty_report_ingest::{DEFAULT_CSV_PATH, LoadOutcome, populate_if_empty, read_records, reload};

#[derive(Parser)]
#[command(name = "penalty_report_ingest", about = "Penalty report dataset loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the dataset CSV into the record store
    Load {
        /// Path to the dataset CSV
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,
        /// Path to the record store
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
        /// Replace existing records instead of skipping a populated store
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate the dataset CSV without storing anything
    Check {
        /// Path to the dataset CSV
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,
    },
    /// Print the number of stored records
    Count {
        /// Path to the record store
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Load { csv, db, force } => {
            let db = open_db(&db).await?;
            let start = Instant::now();

            if force {
                let records = reload(db.as_ref(), &csv).await?;
                log::info!(
                    "Reloaded {records} records in {:.1}s",
                    start.elapsed().as_secs_f64()
                );
            } else {
                match populate_if_empty(db.as_ref(), &csv).await? {
                    LoadOutcome::Loaded { records } => log::info!(
                        "Loaded {records} records in {:.1}s",
                        start.elapsed().as_secs_f64()
                    ),
                    LoadOutcome::Skipped { existing } => log::info!(
                        "Store already holds {existing} records; pass --force to replace them"
                    ),
                }
            }
        }
        Commands::Check { csv } => {
            let records = read_records(&csv)?;
            let mobile = records.iter().filter(|r| r.is_mobile_phone()).count();
            println!("{} records OK ({mobile} mobile phone)", records.len());
        }
        Commands::Count { db } => {
            let db = open_db(&db).await?;
            println!("{}", queries::count_records(db.as_ref()).await?);
        }
    }

    Ok(())
}
