//! Core data types shared across the fetch-aggregate-persist pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Published package name, e.g. `@fontsource/inter`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External statistics source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// npm registry download counts
    Npm,
    /// jsDelivr CDN hit counts
    #[serde(rename = "jsdelivr")]
    Cdn,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Npm, Provider::Cdn];

    /// Stable name used in output file names and the totals document
    pub fn slug(self) -> &'static str {
        match self {
            Provider::Npm => "npm",
            Provider::Cdn => "jsdelivr",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Which provider query a request issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatWindow {
    Month,
    CumulativeRange,
    RollingYear,
    RollingYearPrior,
}

impl StatWindow {
    /// The aggregate bucket a fact for this window lands in
    pub fn metric(self) -> Metric {
        match self {
            StatWindow::Month => Metric::Month,
            StatWindow::CumulativeRange | StatWindow::RollingYear | StatWindow::RollingYearPrior => {
                Metric::Total
            }
        }
    }
}

impl fmt::Display for StatWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatWindow::Month => "month",
            StatWindow::CumulativeRange => "cumulative",
            StatWindow::RollingYear => "rolling-year",
            StatWindow::RollingYearPrior => "rolling-year-prior",
        };
        f.write_str(name)
    }
}

/// Aggregated metric: point-in-time month or cumulative total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Month,
    Total,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Month, Metric::Total];

    pub fn slug(self) -> &'static str {
        match self {
            Metric::Month => "month",
            Metric::Total => "total",
        }
    }
}

/// One normalised count produced by a successful adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFact {
    pub package: PackageId,
    pub provider: Provider,
    pub window: StatWindow,
    pub downloads: u64,
}

/// Kind of published package a catalog entry expands into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageVariant {
    Standard,
    Variable,
    Legacy,
}

/// A package queued for one run, carrying its catalog position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Position in catalog order, used to break ranking ties
    pub ordinal: usize,
    pub package: PackageId,
    /// Bare catalog id the package was derived from
    pub catalog_id: String,
    pub variant: PackageVariant,
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.package, f)
    }
}

/// Whether namespace variants of one catalog id share a ranking entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantPolicy {
    /// Standard, variable and legacy packages sum into the bare catalog id
    Merge,
    /// Every published package name is its own ranking entry
    Separate,
}

impl VariantPolicy {
    pub fn ranking_key(self, submission: &Submission) -> String {
        match self {
            VariantPolicy::Merge => submission.catalog_id.clone(),
            VariantPolicy::Separate => submission.package.as_str().to_string(),
        }
    }
}
