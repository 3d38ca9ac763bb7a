use crate::cli::commands::load_config;
use crate::errors::AppResult;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ShowConfigCommand {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ShowConfigCommand {
    pub fn run(&self) -> AppResult<()> {
        let config = load_config(self.config.as_ref())?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        Ok(())
    }
}
