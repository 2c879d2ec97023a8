//! Wallet Warden - transfer authorization gateway for a Monero wallet
//!
//! # WARNING
//! - This tool moves real funds. Transfers ship disabled; enable them only
//!   after reviewing every limit in the configuration.
//! - A sweep moves the ENTIRE unlocked balance.
//! - An allowlist is the strongest guard available. Use one.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

// Use the library crate
use wallet_warden::cli::commands;
use wallet_warden::config::Config;

/// Wallet Warden - transfer authorization gateway
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a transfer for authorization
    Transfer {
        /// Destination address
        destination: String,

        /// Decimal amount, e.g. "0.25"
        amount: String,

        /// Priority: default, unimportant, normal, elevated
        #[arg(long)]
        priority: Option<String>,

        /// Skip the interactive confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Sweep ALL unlocked funds to a destination
    Sweep {
        /// Destination address
        destination: String,

        /// Priority: default, unimportant, normal, elevated
        #[arg(long)]
        priority: Option<String>,

        /// Skip the interactive confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Redeem a previously issued confirmation token
    Confirm {
        /// Token returned by a pending transfer or sweep
        token: String,
    },

    /// Show authorization status and limiter state
    Status,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_warden=info".parse()?),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.transfers.allowlist.is_empty() {
        warn!("No allowlist configured: any valid address can receive funds");
    }

    // Execute command
    let result = match cli.command {
        Commands::Transfer {
            destination,
            amount,
            priority,
            yes,
        } => commands::transfer(&config, &destination, &amount, priority.as_deref(), yes).await,
        Commands::Sweep {
            destination,
            priority,
            yes,
        } => commands::sweep(&config, &destination, priority.as_deref(), yes).await,
        Commands::Confirm { token } => commands::confirm(&config, &token).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
