//! AdGuard Sync CLI
//!
//! Keeps AdGuard Home replicas in sync with an origin instance.
//!
//! # Commands
//!
//! - `run` - Synchronize every replica once and print the report
//! - `watch` - Synchronize repeatedly until interrupted
//! - `check` - Validate the configuration and probe every instance

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::run::OutputFormat;
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Synchronize AdGuard Home instances.
#[derive(Parser)]
#[command(name = "adguard-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(global = true, short, long, default_value = "adguard-sync.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize every replica once
    Run {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Synchronize repeatedly until Ctrl-C
    Watch {
        /// Seconds between runs (overrides `interval_secs`)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate the configuration and probe every instance
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins unless -v is given
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { format } => {
            let config = Config::load(&cli.config)?;
            if !commands::run::run(&config, format).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Watch { interval, format } => {
            let config = Config::load(&cli.config)?;
            let secs = interval.unwrap_or(config.interval_secs);
            if secs == 0 {
                return Err("interval must be greater than 0".into());
            }
            commands::watch::run(&config, Duration::from_secs(secs), format).await?;
        }
        Commands::Check => {
            let config = Config::load(&cli.config)?;
            if !commands::check::run(&config).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Version => {
            println!("AdGuard Sync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(ExitCode::SUCCESS)
}
