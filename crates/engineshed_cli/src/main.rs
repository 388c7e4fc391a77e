//! Inventory maintenance CLI.
//!
//! # Responsibility
//! - Report parents whose ordered collections hold gaps or duplicates.
//! - Repair those collections through the core indexer.
//!
//! # Invariants
//! - The database file must already exist; it is never created here.
//! - `check` opens the file read-only and never migrates it.

mod commands;

use clap::{Parser, Subcommand};
use engineshed_core::db::{open_db_read_only, open_existing_db};
use engineshed_core::{core_version, init_logging, LoggingConfig};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "engineshed")]
#[command(about = "Inspect and repair ordered collections in an EngineShed inventory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core library version
    Version,
    /// List parents whose child indexes are not contiguous
    Check {
        /// Inventory database file
        db: PathBuf,
    },
    /// Renumber every collection so child indexes are contiguous
    Repair {
        /// Inventory database file
        db: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(config) = LoggingConfig::from_env() {
        if let Err(err) = init_logging(&config) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(cli.command) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> commands::CommandResult<u8> {
    match command {
        Commands::Version => {
            println!("engineshed_core version={}", core_version());
            Ok(0)
        }
        Commands::Check { db } => {
            let conn = open_db_read_only(&db)?;
            let broken = commands::check(&conn, &mut io::stdout().lock())?;
            Ok(commands::check_exit_status(broken))
        }
        Commands::Repair { db } => {
            let conn = open_existing_db(&db)?;
            commands::repair(&conn, &mut io::stdout().lock())?;
            Ok(0)
        }
    }
}
