//! One complete batch run: catalog -> pool -> aggregate -> gated persist

use crate::aggregate::{AggregateSnapshot, AggregateState};
use crate::catalog::{CatalogProvider, FileCatalog};
use crate::config::{AppConfig, PackagesConfig};
use crate::errors::{AppError, AppResult, TaskError};
use crate::fetch::{FetchCounts, FetchStats, HttpTransport, RateLimitedFetcher};
use crate::persist::{GateDecision, OutputLayout, Persister};
use crate::pool::{PoolReport, WorkerPool};
use crate::sources::{CdnSource, NpmSource, StatSource};
use crate::types::{Metric, Provider, Submission};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info};

/// What the run did with its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    Updated { previous: u64, current: u64 },
    Unchanged { previous: u64, current: u64 },
    DryRun { previous: u64, current: u64, would_update: bool },
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: PoolReport,
    pub snapshot: AggregateSnapshot,
    pub decision: RunDecision,
    /// HTTP counters, when the run owns its fetcher
    pub fetch: Option<FetchCounts>,
}

pub type Sources = Arc<Vec<Box<dyn StatSource>>>;

pub struct StatsRun {
    catalog: Box<dyn CatalogProvider + Send + Sync>,
    sources: Sources,
    pool: WorkerPool,
    persister: Persister,
    naming: PackagesConfig,
    dry_run: bool,
    fetch_stats: Option<Arc<FetchStats>>,
}

impl StatsRun {
    pub fn new(
        catalog: Box<dyn CatalogProvider + Send + Sync>,
        sources: Vec<Box<dyn StatSource>>,
        pool: WorkerPool,
        persister: Persister,
        naming: PackagesConfig,
    ) -> Self {
        Self {
            catalog,
            sources: Arc::new(sources),
            pool,
            persister,
            naming,
            dry_run: false,
            fetch_stats: None,
        }
    }

    /// Wire up the production run described by `config`
    ///
    /// `run_date` closes the cumulative npm range and is fixed for the run.
    pub fn from_config(
        config: &AppConfig,
        transport: Arc<dyn HttpTransport>,
        run_date: NaiveDate,
    ) -> AppResult<Self> {
        config.validate()?;

        let start = config.npm.cumulative_start_date()?;
        if start > run_date {
            return Err(AppError::Config(format!(
                "npm.cumulative_start {} is after the run date {}",
                start, run_date
            )));
        }

        let fetcher = RateLimitedFetcher::new(transport, &config.fetch);
        let fetch_stats = fetcher.stats();
        let mut sources: Vec<Box<dyn StatSource>> = vec![Box::new(NpmSource::new(
            fetcher.clone(),
            &config.npm,
            start,
            run_date,
        ))];
        if config.cdn.enabled {
            sources.push(Box::new(CdnSource::new(fetcher, &config.cdn)));
        }

        let providers = sources.iter().map(|s| s.provider()).collect();
        let persister = Persister::new(
            OutputLayout::new(&config.paths.output_dir),
            config.badges.clone(),
            providers,
        );
        let catalog = FileCatalog::new(&config.paths.catalog, config.paths.legacy_catalog.clone());

        let mut run = Self::new(
            Box::new(catalog),
            sources,
            WorkerPool::new(config.pool.concurrency)?,
            persister,
            config.packages.clone(),
        );
        run.fetch_stats = Some(fetch_stats);
        Ok(run)
    }

    /// Compute everything but never write
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.sources.iter().map(|s| s.provider()).collect()
    }

    pub async fn execute(&self) -> AppResult<RunOutcome> {
        // Setup failures abort here, before any task is scheduled
        let catalog = self.catalog.load()?;
        let previous = self.persister.load_previous()?;

        let submissions = catalog.submissions(&self.naming);
        let state = Arc::new(AggregateState::new(self.naming.variant_policy));
        info!(
            "Processing {} packages from {} providers ({:?} variants)",
            submissions.len(),
            self.sources.len(),
            self.naming.variant_policy
        );

        let report = {
            let sources = Arc::clone(&self.sources);
            let state = Arc::clone(&state);
            self.pool
                .run(submissions, move |submission| {
                    process_package(submission, Arc::clone(&sources), Arc::clone(&state))
                })
                .await
        };

        let snapshot = state.snapshot();
        info!(
            "Recorded {} facts; npm month {} total {}",
            snapshot.facts,
            snapshot.total(Provider::Npm, Metric::Month),
            snapshot.total(Provider::Npm, Metric::Total)
        );
        let fetch = self.fetch_stats.as_ref().map(|stats| stats.counts());
        if let Some(counts) = fetch {
            info!(
                "HTTP: {} requests, {} rate limited, {} failed",
                counts.requests, counts.rate_limited, counts.failures
            );
        }

        let decision = if self.dry_run {
            let gate = self.persister.decide(&snapshot, previous.as_ref());
            let (previous, current) = match gate {
                GateDecision::Update { previous, current }
                | GateDecision::Unchanged { previous, current } => (previous, current),
            };
            info!("Dry run: would {}write outputs", if gate.should_write() { "" } else { "not " });
            RunDecision::DryRun {
                previous,
                current,
                would_update: gate.should_write(),
            }
        } else {
            match self
                .persister
                .commit_if_greater(&snapshot, previous.as_ref())?
            {
                GateDecision::Update { previous, current } => {
                    RunDecision::Updated { previous, current }
                }
                GateDecision::Unchanged { previous, current } => {
                    RunDecision::Unchanged { previous, current }
                }
            }
        };

        Ok(RunOutcome {
            report,
            snapshot,
            decision,
            fetch,
        })
    }
}

/// Query every source for one package and record what succeeded
///
/// Each provider stands alone: a failing provider is logged and skipped,
/// the others still record. The task only fails when every provider did.
pub async fn process_package(
    submission: Submission,
    sources: Sources,
    state: Arc<AggregateState>,
) -> Result<(), TaskError> {
    let mut failed = 0usize;

    for source in sources.iter() {
        match source.collect(&submission.package).await {
            Ok(facts) => {
                for fact in &facts {
                    state.record(&submission, fact);
                }
            }
            Err(e) => {
                failed += 1;
                error!(
                    "{} ({}): skipping provider: {}",
                    submission.package,
                    source.provider(),
                    e
                );
            }
        }
    }

    if !sources.is_empty() && failed == sources.len() {
        return Err(TaskError::SourcesFailed {
            package: submission.package.to_string(),
            attempted: failed,
        });
    }

    info!("Fetched {}", submission.package);
    Ok(())
}
