pub mod run;
pub mod show_config;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;
use tracing::info;

/// Load configuration, optionally from an explicit file
pub(crate) fn load_config(path: Option<&PathBuf>) -> AppResult<AppConfig> {
    let config = AppConfig::load_from(path.map(PathBuf::as_path))
        .map_err(|e| AppError::Config(format!("Failed to load configuration: {}", e)))?;
    info!("Configuration loaded successfully");
    Ok(config)
}
