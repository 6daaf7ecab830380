//! Alpine Guardian CLI - Migrations and backend checks.
//!
//! # Usage
//!
//! ```bash
//! # Create the storefront and admin session tables
//! ag-cli migrate sessions
//!
//! # Create the Account side table in the hosted project
//! ag-cli migrate account
//!
//! # Both
//! ag-cli migrate all
//!
//! # Probe the hosted backend's tables and role setup
//! ag-cli doctor
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ag-cli")]
#[command(author, version, about = "Alpine Guardian CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Check the hosted backend's tables and role configuration
    Doctor,
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Create the session store tables
    Sessions,
    /// Create the Account side table and its policies
    Account,
    /// Run all migrations
    All,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
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
        Commands::Migrate { target } => match target {
            MigrateTarget::Sessions => commands::migrate::sessions().await?,
            MigrateTarget::Account => commands::migrate::account().await?,
            MigrateTarget::All => {
                commands::migrate::sessions().await?;
                commands::migrate::account().await?;
            }
        },
        Commands::Doctor => commands::doctor::run().await?,
    }
    Ok(())
}
