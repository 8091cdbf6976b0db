mod api;
mod cli;
mod config;
mod error;
mod models;
mod services;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::services::EventStatus;

#[derive(Parser)]
#[command(name = "odds-aggregator")]
#[command(about = "Aggregates live and upcoming sports odds behind a cached HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one refresh and print the games found
    Fetch {
        #[arg(short, long)]
        sport: Option<String>,
        /// Only games in progress
        #[arg(long, conflicts_with = "upcoming")]
        live: bool,
        /// Only games not started yet
        #[arg(long)]
        upcoming: bool,
    },
    /// List the provider's sports
    Sports,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("odds_aggregator=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env().context("failed to load configuration")?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                settings.port = port;
            }
            tracing::info!("Starting odds aggregator on port {}", settings.port);
            api::serve(settings).await?;
        }
        Some(Commands::Fetch { sport, live, upcoming }) => {
            let status = match (live, upcoming) {
                (true, _) => EventStatus::Live,
                (_, true) => EventStatus::Upcoming,
                _ => EventStatus::Any,
            };
            tracing::info!("Fetching {:?} games (sport filter: {:?})", status, sport);
            cli::fetch_games(settings, sport, status).await?;
        }
        Some(Commands::Sports) => {
            cli::list_sports(settings).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting odds aggregator on port {}", settings.port);
            api::serve(settings).await?;
        }
    }

    Ok(())
}
