//! Threshold-gated output persistence
//!
//! Outputs are only replaced when the new npm cumulative total is strictly
//! greater than the one recorded in `totals.json` by the previous
//! successful run. Comparison is always on the raw integers stored there,
//! never on the formatted badge text.
//!
//! Every document is first written to a temp file next to its target; the
//! temp files are renamed into place only once all of them were written,
//! with `totals.json` last.

use crate::aggregate::AggregateSnapshot;
use crate::config::BadgeConfig;
use crate::errors::{AppError, AppResult};
use crate::types::{Metric, Provider};
use crate::utils::magnitude::format_compact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const TOTALS_FILE: &str = "totals.json";
pub const BADGE_SCHEMA_VERSION: u8 = 1;
pub const TOTALS_SCHEMA_VERSION: u32 = 1;

/// The provider whose cumulative total gates every write
pub const PRIMARY_PROVIDER: Provider = Provider::Npm;

/// shields.io endpoint badge document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub schema_version: u8,
    pub label: String,
    pub message: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTotals {
    pub month: u64,
    pub total: u64,
}

/// Raw integers kept alongside the badges for the next run's comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTotals {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub providers: BTreeMap<Provider, ProviderTotals>,
}

impl PersistedTotals {
    pub fn total(&self, provider: Provider) -> u64 {
        self.providers
            .get(&provider)
            .map(|t| t.total)
            .unwrap_or(0)
    }
}

/// Result of the monotonicity gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Update { previous: u64, current: u64 },
    Unchanged { previous: u64, current: u64 },
}

impl GateDecision {
    pub fn evaluate(previous: u64, current: u64) -> Self {
        if current > previous {
            GateDecision::Update { previous, current }
        } else {
            GateDecision::Unchanged { previous, current }
        }
    }

    pub fn should_write(&self) -> bool {
        matches!(self, GateDecision::Update { .. })
    }
}

/// File layout of the output directory
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn totals(&self) -> PathBuf {
        self.root.join(TOTALS_FILE)
    }

    pub fn badge(&self, provider: Provider, metric: Metric) -> PathBuf {
        self.root
            .join("badges")
            .join(format!("{}-{}.json", provider.slug(), metric.slug()))
    }

    pub fn ranking(&self, provider: Provider, metric: Metric) -> PathBuf {
        self.root
            .join("rankings")
            .join(format!("{}-{}.json", provider.slug(), metric.slug()))
    }
}

/// Writes badges, rankings and totals when the gate allows it
pub struct Persister {
    layout: OutputLayout,
    badges: BadgeConfig,
    providers: Vec<Provider>,
}

impl Persister {
    /// `providers` lists the sources enabled for this run, primary first
    pub fn new(layout: OutputLayout, badges: BadgeConfig, providers: Vec<Provider>) -> Self {
        Self {
            layout,
            badges,
            providers,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Read the previous run's totals; `None` on a first run
    pub fn load_previous(&self) -> AppResult<Option<PersistedTotals>> {
        let path = self.layout.totals();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No previous totals at {}, treating as first run", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::Snapshot(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AppError::Snapshot(format!("{} is malformed: {}", path.display(), e)))
    }

    pub fn decide(
        &self,
        snapshot: &AggregateSnapshot,
        previous: Option<&PersistedTotals>,
    ) -> GateDecision {
        let previous = previous.map(|p| p.total(PRIMARY_PROVIDER)).unwrap_or(0);
        GateDecision::evaluate(previous, snapshot.total(PRIMARY_PROVIDER, Metric::Total))
    }

    /// Gate and, if allowed, replace every output document
    pub fn commit_if_greater(
        &self,
        snapshot: &AggregateSnapshot,
        previous_totals: Option<&PersistedTotals>,
    ) -> AppResult<GateDecision> {
        let decision = self.decide(snapshot, previous_totals);
        match decision {
            GateDecision::Update { previous, current } => {
                let written = self.write_all(snapshot, previous_totals, Utc::now())?;
                info!(
                    "Total grew {} -> {}, wrote {} documents to {}",
                    previous,
                    current,
                    written.len(),
                    self.layout.root().display()
                );
            }
            GateDecision::Unchanged { previous, current } => {
                info!(
                    "Total {} does not exceed previous {}, no update needed",
                    current, previous
                );
            }
        }
        Ok(decision)
    }

    /// Render every document for `snapshot`, totals last
    ///
    /// Providers disabled for this run keep their `previous` totals so
    /// `totals.json` still describes the badges left on disk for them.
    pub fn render(
        &self,
        snapshot: &AggregateSnapshot,
        previous: Option<&PersistedTotals>,
        generated_at: DateTime<Utc>,
    ) -> AppResult<Vec<(PathBuf, Vec<u8>)>> {
        let mut documents = Vec::new();
        let mut providers = BTreeMap::new();

        for &provider in &self.providers {
            for metric in Metric::ALL {
                let badge = self.badge(provider, metric, snapshot.total(provider, metric));
                documents.push((
                    self.layout.badge(provider, metric),
                    serde_json::to_vec_pretty(&badge)?,
                ));

                let ranking: Map<String, Value> = snapshot
                    .ranking(provider, metric)
                    .iter()
                    .map(|(name, count)| (name.clone(), Value::from(*count)))
                    .collect();
                documents.push((
                    self.layout.ranking(provider, metric),
                    serde_json::to_vec_pretty(&ranking)?,
                ));
            }
            providers.insert(
                provider,
                ProviderTotals {
                    month: snapshot.total(provider, Metric::Month),
                    total: snapshot.total(provider, Metric::Total),
                },
            );
        }

        for (provider, totals) in previous.map(|p| &p.providers).into_iter().flatten() {
            if !providers.contains_key(provider) {
                info!("{} disabled this run, keeping its previous totals", provider);
                providers.insert(*provider, *totals);
            }
        }

        let totals = PersistedTotals {
            schema_version: TOTALS_SCHEMA_VERSION,
            generated_at,
            providers,
        };
        documents.push((self.layout.totals(), serde_json::to_vec_pretty(&totals)?));
        Ok(documents)
    }

    pub fn badge(&self, provider: Provider, metric: Metric, count: u64) -> Badge {
        let label = match provider {
            Provider::Npm => &self.badges.npm_label,
            Provider::Cdn => &self.badges.cdn_label,
        };
        let message = match metric {
            Metric::Month => format!("{}/month", format_compact(count)),
            Metric::Total => format_compact(count),
        };
        Badge {
            schema_version: BADGE_SCHEMA_VERSION,
            label: label.clone(),
            message,
            color: self.badges.color.clone(),
        }
    }

    /// Stage every document in a temp file, then rename them all into place
    pub fn write_all(
        &self,
        snapshot: &AggregateSnapshot,
        previous: Option<&PersistedTotals>,
        generated_at: DateTime<Utc>,
    ) -> AppResult<Vec<PathBuf>> {
        let documents = self.render(snapshot, previous, generated_at)?;

        let mut staged = Vec::with_capacity(documents.len());
        for (path, bytes) in documents {
            let temp = stage(&path, &bytes)?;
            staged.push((path, temp));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (path, temp) in staged {
            temp.persist(&path).map_err(|e| AppError::Persist {
                path: path.display().to_string(),
                reason: e.error.to_string(),
            })?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn stage(path: &Path, bytes: &[u8]) -> AppResult<NamedTempFile> {
    let persist_error = |e: std::io::Error| AppError::Persist {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(persist_error)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(persist_error)?;
    temp.write_all(bytes).map_err(persist_error)?;
    temp.write_all(b"\n").map_err(persist_error)?;
    match_target_permissions(path, &temp).map_err(persist_error)?;
    temp.as_file().sync_all().map_err(persist_error)?;
    Ok(temp)
}

/// Default mode for a document that does not exist yet
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// Temp files are created owner-only; give them the replaced file's mode,
/// or world-readable for a new file, before they are renamed into place
#[cfg(unix)]
fn match_target_permissions(target: &Path, temp: &NamedTempFile) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match fs::metadata(target) {
        Ok(existing) => existing.permissions().mode() & 0o777,
        Err(e) if e.kind() == ErrorKind::NotFound => OUTPUT_MODE,
        Err(e) => return Err(e),
    };
    temp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn match_target_permissions(_target: &Path, _temp: &NamedTempFile) -> std::io::Result<()> {
    Ok(())
}
