//! Cyclemart CLI - Database migrations and taxonomy management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cm-cli migrate
//!
//! # Import the marketplace category tree
//! cm-cli categories import taxonomy.yaml
//!
//! # Validate a taxonomy file without touching the database
//! cm-cli categories import taxonomy.yaml --dry-run
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `categories import` - Upsert a nested category tree from YAML

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cm-cli")]
#[command(author, version, about = "Cyclemart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the marketplace taxonomy
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Upsert categories from a YAML tree (`name`, `slug`, `children`)
    Import {
        /// Path to the YAML file
        file: PathBuf,

        /// Validate the file and report what would be imported
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Categories { action } => match action {
            CategoryAction::Import { file, dry_run } => {
                commands::categories::import(&file, dry_run).await?;
            }
        },
    }
    Ok(())
}
