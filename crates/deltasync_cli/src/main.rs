//! deltasync CLI
//!
//! Command-line driver for a deltasync store kept in a SQLite file.
//!
//! # Commands
//!
//! - `init` - Create the backing tables
//! - `sync` - Run one exchange and print the response
//! - `gc` - Purge expired tombstones
//! - `schema` - Print the payload contract

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// deltasync command-line tools.
#[derive(Parser)]
#[command(name = "deltasync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(global = true, short, long)]
    db: Option<PathBuf>,

    /// Path to the store description (JSON)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the backing tables of every configured table
    Init,

    /// Run one exchange
    Sync {
        /// Request file (JSON); reads stdin when omitted
        #[arg(short, long)]
        request: Option<PathBuf>,

        /// Partition value as column=value (repeatable)
        #[arg(short, long = "extra", value_name = "COLUMN=VALUE")]
        extras: Vec<String>,

        /// Pretty-print the response
        #[arg(short, long)]
        pretty: bool,
    },

    /// Purge tombstones older than the retention window
    Gc {
        /// Retention in seconds (defaults to the configured retention)
        #[arg(short, long)]
        retention_secs: Option<i64>,
    },

    /// Print the JSON-Schema contract for exchange payloads
    Schema,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            let config = cli.config.ok_or("Store description required for init")?;
            let db = cli.db.ok_or("Database path required for init")?;
            commands::init::run(&db, &config)?;
        }
        Commands::Sync {
            request,
            extras,
            pretty,
        } => {
            let config = cli.config.ok_or("Store description required for sync")?;
            let db = cli.db.ok_or("Database path required for sync")?;
            commands::sync::run(&db, &config, request.as_deref(), &extras, pretty)?;
        }
        Commands::Gc { retention_secs } => {
            let config = cli.config.ok_or("Store description required for gc")?;
            let db = cli.db.ok_or("Database path required for gc")?;
            commands::gc::run(&db, &config, retention_secs)?;
        }
        Commands::Schema => {
            let config = cli.config.ok_or("Store description required for schema")?;
            commands::schema::run(&config)?;
        }
        Commands::Version => {
            println!("deltasync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("deltasync Core v{}", deltasync_core::VERSION);
        }
    }

    Ok(())
}
