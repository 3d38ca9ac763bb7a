//! Package catalog: which identifiers a run processes
//!
//! The catalog itself is produced elsewhere; this module reads the
//! pre-fetched documents and expands each catalog id into the published
//! package names that get submitted to the worker pool.

use crate::config::PackagesConfig;
use crate::errors::{AppError, AppResult};
use crate::types::{PackageId, PackageVariant, Submission};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    /// Whether a variable-font package is also published
    pub variable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    /// Bare ids still published under the pre-scope naming
    pub legacy: Vec<String>,
}

/// Source of the package catalog for one run
pub trait CatalogProvider {
    fn load(&self) -> AppResult<Catalog>;
}

/// Catalog read from local JSON documents
pub struct FileCatalog {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>, legacy_path: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path,
        }
    }

    fn read(path: &Path) -> AppResult<String> {
        fs::read_to_string(path)
            .map_err(|e| AppError::Catalog(format!("Failed to read {}: {}", path.display(), e)))
    }
}

impl CatalogProvider for FileCatalog {
    fn load(&self) -> AppResult<Catalog> {
        let mut catalog = Catalog::from_json(&Self::read(&self.path)?)
            .map_err(|e| AppError::Catalog(format!("{}: {}", self.path.display(), e)))?;

        if let Some(legacy_path) = &self.legacy_path {
            catalog.legacy = Catalog::legacy_from_json(&Self::read(legacy_path)?)
                .map_err(|e| AppError::Catalog(format!("{}: {}", legacy_path.display(), e)))?;
        }

        info!(
            "Loaded catalog: {} ids ({} variable), {} legacy",
            catalog.entries.len(),
            catalog.entries.iter().filter(|e| e.variable).count(),
            catalog.legacy.len()
        );
        Ok(catalog)
    }
}

impl Catalog {
    /// Parse `{ "<id>": <variable flag>, ... }`, keeping document order
    pub fn from_json(content: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object of id -> bool".to_string())?;

        let entries = object
            .iter()
            .map(|(id, flag)| match flag {
                Value::Bool(variable) => Ok(CatalogEntry {
                    id: id.clone(),
                    variable: *variable,
                }),
                other => Err(format!("id '{}' has non-boolean flag {}", id, other)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            legacy: Vec::new(),
        })
    }

    /// Parse `[ "<id>", ... ]`
    pub fn legacy_from_json(content: &str) -> Result<Vec<String>, String> {
        serde_json::from_str(content).map_err(|e| format!("expected a JSON array of ids: {}", e))
    }

    /// Expand into pool submissions in catalog order
    ///
    /// Every id yields its scoped package, then its variable package if
    /// flagged; legacy ids follow. A package name already queued is skipped
    /// so no package is submitted twice.
    pub fn submissions(&self, naming: &PackagesConfig) -> Vec<Submission> {
        let mut queued = HashSet::new();
        let mut submissions = Vec::new();

        let mut push = |catalog_id: &str, prefix: &str, variant: PackageVariant| {
            let package = PackageId::new(format!("{}{}", prefix, catalog_id));
            if !queued.insert(package.clone()) {
                warn!("Skipping duplicate catalog package {}", package);
                return;
            }
            submissions.push(Submission {
                ordinal: submissions.len(),
                package,
                catalog_id: catalog_id.to_string(),
                variant,
            });
        };

        for entry in &self.entries {
            push(&entry.id, &naming.scope_prefix, PackageVariant::Standard);
            if entry.variable {
                push(&entry.id, &naming.variable_prefix, PackageVariant::Variable);
            }
        }
        for id in &self.legacy {
            push(id, &naming.legacy_prefix, PackageVariant::Legacy);
        }

        let count = |variant: PackageVariant| submissions.iter().filter(|s| s.variant == variant).count();
        info!(
            "Queued {} packages: {} standard, {} variable, {} legacy",
            submissions.len(),
            count(PackageVariant::Standard),
            count(PackageVariant::Variable),
            count(PackageVariant::Legacy)
        );
        submissions
    }
}
