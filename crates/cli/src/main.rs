//! PartsBin CLI - database migrations and order reports.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! pb-cli migrate
//!
//! # Print order statistics (same figures as the admin listing)
//! pb-cli orders stats
//!
//! # ...as JSON
//! pb-cli orders stats --json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pb-cli")]
#[command(author, version, about = "PartsBin CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Order reports
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Print order counts by status and revenue
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Orders { action } => match action {
            OrdersAction::Stats { json } => commands::orders::stats(json).await?,
        },
    }
    Ok(())
}
