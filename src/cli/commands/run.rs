use crate::cli::commands::load_config;
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::fetch::ReqwestTransport;
use crate::pipeline::{RunDecision, RunOutcome, StatsRun};
use crate::types::{Metric, Provider};
use crate::utils::magnitude::format_compact;
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct RunCommand {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog JSON mapping id -> variable flag (overrides config.toml and env vars)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Legacy id list JSON (overrides config.toml and env vars)
    #[arg(long)]
    legacy_catalog: Option<PathBuf>,

    /// Output directory for badges, rankings and totals (overrides config.toml)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum packages processed at once (overrides config.toml)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip jsDelivr statistics
    #[arg(long)]
    no_cdn: bool,

    /// Compute and report, but never write outputs
    #[arg(long)]
    dry_run: bool,
}

impl RunCommand {
    pub async fn run(&self) -> AppResult<()> {
        info!("=== download-badges run ===");

        let config = self.apply_overrides(load_config(self.config.as_ref())?);
        let transport = ReqwestTransport::new(&config.fetch.user_agent).map_err(AppError::Config)?;

        let run = StatsRun::from_config(&config, Arc::new(transport), Utc::now().date_naive())?
            .dry_run(self.dry_run);
        let outcome = run.execute().await?;

        print_summary(&outcome);
        Ok(())
    }

    /// CLI arguments override config values
    fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(catalog) = &self.catalog {
            config.paths.catalog = catalog.clone();
        }
        if let Some(legacy) = &self.legacy_catalog {
            config.paths.legacy_catalog = Some(legacy.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            config.paths.output_dir = output_dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.pool.concurrency = concurrency;
        }
        if self.no_cdn {
            config.cdn.enabled = false;
        }
        config
    }
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    println!(
        "Packages: {} submitted, {} succeeded, {} failed",
        report.submitted, report.succeeded, report.failed
    );
    if let Some(fetch) = outcome.fetch {
        println!(
            "Requests: {} sent, {} rate limited, {} failed",
            fetch.requests, fetch.rate_limited, fetch.failures
        );
    }
    for provider in Provider::ALL {
        if !outcome.snapshot.has_provider(provider) {
            continue;
        }
        println!(
            "  {:<9} month {:>8}  total {:>8}",
            provider.slug(),
            format_compact(outcome.snapshot.total(provider, Metric::Month)),
            format_compact(outcome.snapshot.total(provider, Metric::Total)),
        );
    }

    match outcome.decision {
        RunDecision::Updated { previous, current } => {
            println!("Updated outputs (total {} -> {})", previous, current)
        }
        RunDecision::Unchanged { previous, current } => {
            println!("No update needed (total {} <= previous {})", current, previous)
        }
        RunDecision::DryRun {
            previous,
            current,
            would_update,
        } => println!(
            "Dry run: total {} vs previous {}, would {}update",
            current,
            previous,
            if would_update { "" } else { "not " }
        ),
    }
}
