//! Parley CLI, the main entry point.
//!
//! Commands:
//! - `run`: Connect to Satori and run the decision loop
//! - `doctor`: Diagnose configuration and connectivity prerequisites
//! - `channels`: List channels the bot has seen
//! - `config`: Print the default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — an LLM-driven chat bot for Satori",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until interrupted
    Run {
        /// Config file (defaults to ~/.parley/config.toml)
        #[arg(short, long, env = "PARLEY_CONFIG")]
        config: Option<PathBuf>,

        /// Keep channels and messages in memory only
        #[arg(long)]
        memory_store: bool,
    },

    /// Diagnose system health
    Doctor {
        #[arg(short, long, env = "PARLEY_CONFIG")]
        config: Option<PathBuf>,
    },

    /// List channels known to the store
    Channels {
        #[arg(short, long, env = "PARLEY_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the default config.toml
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run {
            config,
            memory_store,
        } => commands::run::run(config, memory_store).await?,
        Commands::Doctor { config } => commands::doctor::run(config).await?,
        Commands::Channels { config } => commands::channels::run(config).await?,
        Commands::Config => commands::config_cmd::show(),
    }

    Ok(())
}
