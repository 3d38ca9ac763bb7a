use crate::errors::{AppError, AppResult};
use crate::types::VariantPolicy;
use chrono::NaiveDate;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `DOWNLOAD_BADGES__POOL__CONCURRENCY=4`
pub const ENV_PREFIX: &str = "DOWNLOAD_BADGES";

/// Application configuration loaded from config.toml or environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
    pub pool: PoolConfig,
    pub npm: NpmConfig,
    pub cdn: CdnConfig,
    pub packages: PackagesConfig,
    pub badges: BadgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub catalog: PathBuf,
    #[serde(default)]
    pub legacy_catalog: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// HTTP fetch behaviour shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub rate_limit_backoff_ms: u64,
    /// Unset in production: 429s are retried until the provider relents.
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
    pub user_agent: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            rate_limit_backoff_ms: 5_000,
            max_rate_limit_retries: None,
            user_agent: concat!("download-badges/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmConfig {
    pub base_url: String,
    /// First day (YYYY-MM-DD) counted towards the cumulative total
    pub cumulative_start: String,
    /// Longest span a single range query may cover
    pub max_range_days: u32,
}

impl NpmConfig {
    pub fn cumulative_start_date(&self) -> AppResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.cumulative_start, "%Y-%m-%d").map_err(|e| {
            AppError::Config(format!(
                "npm.cumulative_start '{}' is not a YYYY-MM-DD date: {}",
                self.cumulative_start, e
            ))
        })
    }
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.npmjs.org".to_string(),
            cumulative_start: "2020-01-01".to_string(),
            max_range_days: 540,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    pub enabled: bool,
    pub base_url: String,
    pub month_period: String,
    pub year_period: String,
    pub prior_year_period: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://data.jsdelivr.com/v1".to_string(),
            month_period: "month".to_string(),
            year_period: "year".to_string(),
            prior_year_period: "s-year".to_string(),
        }
    }
}

/// How catalog ids map onto published package names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    pub scope_prefix: String,
    pub variable_prefix: String,
    pub legacy_prefix: String,
    pub variant_policy: VariantPolicy,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            scope_prefix: "@fontsource/".to_string(),
            variable_prefix: "@fontsource-variable/".to_string(),
            legacy_prefix: "fontsource-".to_string(),
            variant_policy: VariantPolicy::Merge,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeConfig {
    pub color: String,
    pub npm_label: String,
    pub cdn_label: String,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            color: "brightgreen".to_string(),
            npm_label: "downloads".to_string(),
            cdn_label: "jsDelivr".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                catalog: PathBuf::from("./data/fontlist.json"),
                legacy_catalog: None,
                output_dir: PathBuf::from("./data"),
            },
            fetch: FetchConfig::default(),
            pool: PoolConfig { concurrency: 18 },
            npm: NpmConfig::default(),
            cdn: CdnConfig::default(),
            packages: PackagesConfig::default(),
            badges: BadgeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from config.toml file and environment variables
    /// Environment variables take precedence over file configuration
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Same as [`AppConfig::load`] but reading an explicit file, which must exist
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let d = AppConfig::default();
        let file_source = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name("config").required(false),
        };

        let config = Config::builder()
            .set_default("paths.catalog", d.paths.catalog.to_string_lossy().to_string())?
            .set_default(
                "paths.output_dir",
                d.paths.output_dir.to_string_lossy().to_string(),
            )?
            .set_default("fetch.timeout_seconds", d.fetch.timeout_seconds)?
            .set_default("fetch.rate_limit_backoff_ms", d.fetch.rate_limit_backoff_ms)?
            .set_default("fetch.user_agent", d.fetch.user_agent)?
            .set_default("pool.concurrency", d.pool.concurrency as u64)?
            .set_default("npm.base_url", d.npm.base_url)?
            .set_default("npm.cumulative_start", d.npm.cumulative_start)?
            .set_default("npm.max_range_days", d.npm.max_range_days as u64)?
            .set_default("cdn.enabled", d.cdn.enabled)?
            .set_default("cdn.base_url", d.cdn.base_url)?
            .set_default("cdn.month_period", d.cdn.month_period)?
            .set_default("cdn.year_period", d.cdn.year_period)?
            .set_default("cdn.prior_year_period", d.cdn.prior_year_period)?
            .set_default("packages.scope_prefix", d.packages.scope_prefix)?
            .set_default("packages.variable_prefix", d.packages.variable_prefix)?
            .set_default("packages.legacy_prefix", d.packages.legacy_prefix)?
            .set_default("packages.variant_policy", "merge")?
            .set_default("badges.color", d.badges.color)?
            .set_default("badges.npm_label", d.badges.npm_label)?
            .set_default("badges.cdn_label", d.badges.cdn_label)?
            .add_source(file_source)
            // DOWNLOAD_BADGES__<SECTION>__<KEY> overrides any file value
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values that would make the run meaningless before any task starts
    pub fn validate(&self) -> AppResult<()> {
        if self.pool.concurrency == 0 {
            return Err(AppError::Config(
                "pool.concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(AppError::Config(
                "fetch.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.npm.max_range_days == 0 {
            return Err(AppError::Config(
                "npm.max_range_days must be at least 1".to_string(),
            ));
        }
        self.npm.cumulative_start_date()?;
        Ok(())
    }
}
