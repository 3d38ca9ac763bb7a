use crate::errors::AppResult;
use clap::{Parser, Subcommand};

pub mod commands;

/// npm and jsDelivr download statistics for shields.io badges
#[derive(Parser)]
#[command(name = "download-badges")]
#[command(about = "Aggregate package download statistics into badge and ranking documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch statistics for every catalog package and update outputs if the total grew
    Run(commands::run::RunCommand),
    /// Print the effective configuration as JSON
    ShowConfig(commands::show_config::ShowConfigCommand),
}

pub async fn run() -> AppResult<()> {
    // Uses RUST_LOG environment variable (defaults to "info" if not set)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(command) => command.run().await,
        Commands::ShowConfig(command) => command.run(),
    }
}
