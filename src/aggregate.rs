//! Shared accumulation of facts across concurrently running package tasks
//!
//! All mutation goes through [`AggregateState::record`], which holds one
//! lock for the whole update so a fact is either fully counted or not at
//! all. Updates are additive, so the final state does not depend on the
//! order tasks complete in.

use crate::types::{Metric, Provider, StatFact, Submission, VariantPolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PopularityEntry {
    downloads: u64,
    /// Smallest catalog ordinal contributing to this key
    ordinal: usize,
}

#[derive(Debug, Default)]
struct Inner {
    totals: BTreeMap<(Provider, Metric), u64>,
    popularity: BTreeMap<(Provider, Metric), HashMap<String, PopularityEntry>>,
    facts: u64,
}

/// Running sums and popularity maps for one run
#[derive(Debug)]
pub struct AggregateState {
    policy: VariantPolicy,
    inner: Mutex<Inner>,
}

impl AggregateState {
    pub fn new(policy: VariantPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn policy(&self) -> VariantPolicy {
        self.policy
    }

    /// Add one fact to its running sum and popularity map
    ///
    /// A fact that would overflow either sum is logged and dropped whole.
    pub fn record(&self, submission: &Submission, fact: &StatFact) {
        let key = (fact.provider, fact.window.metric());
        let ranking_key = self.policy.ranking_key(submission);

        let mut inner = self.inner.lock().unwrap();

        let total = inner.totals.get(&key).copied().unwrap_or(0);
        let Some(total) = total.checked_add(fact.downloads) else {
            error!(
                "{} {} total overflows adding {} for {}; fact dropped",
                fact.provider,
                key.1.slug(),
                fact.downloads,
                fact.package
            );
            return;
        };

        let map = inner.popularity.entry(key).or_default();
        let entry = match self.policy {
            VariantPolicy::Merge => {
                let current = map.get(&ranking_key).copied().unwrap_or(PopularityEntry {
                    downloads: 0,
                    ordinal: submission.ordinal,
                });
                let Some(downloads) = current.downloads.checked_add(fact.downloads) else {
                    error!(
                        "{} {} ranking entry {} overflows; fact for {} dropped",
                        fact.provider,
                        key.1.slug(),
                        ranking_key,
                        fact.package
                    );
                    return;
                };
                PopularityEntry {
                    downloads,
                    ordinal: current.ordinal.min(submission.ordinal),
                }
            }
            VariantPolicy::Separate => {
                if map.contains_key(&ranking_key) {
                    warn!(
                        "{} {} recorded twice for {}; keeping the latest value",
                        fact.provider,
                        key.1.slug(),
                        fact.package
                    );
                }
                PopularityEntry {
                    downloads: fact.downloads,
                    ordinal: submission.ordinal,
                }
            }
        };
        map.insert(ranking_key, entry);
        inner.totals.insert(key, total);
        inner.facts += 1;
    }

    /// Number of facts recorded so far
    pub fn fact_count(&self) -> u64 {
        self.inner.lock().unwrap().facts
    }

    /// Running total for one provider/metric, 0 when nothing was recorded
    pub fn total(&self, provider: Provider, metric: Metric) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .totals
            .get(&(provider, metric))
            .copied()
            .unwrap_or(0)
    }

    /// Freeze the current state into sorted rankings
    ///
    /// Call once the pool has drained; later records are not reflected.
    pub fn snapshot(&self) -> AggregateSnapshot {
        let inner = self.inner.lock().unwrap();

        let rankings = inner
            .popularity
            .iter()
            .map(|(key, map)| {
                let mut entries: Vec<(&String, &PopularityEntry)> = map.iter().collect();
                entries.sort_by(|(_, a), (_, b)| {
                    b.downloads
                        .cmp(&a.downloads)
                        .then_with(|| a.ordinal.cmp(&b.ordinal))
                });
                let ranking = entries
                    .into_iter()
                    .map(|(name, entry)| (name.clone(), entry.downloads))
                    .collect();
                (*key, ranking)
            })
            .collect();

        AggregateSnapshot {
            totals: inner.totals.clone(),
            rankings,
            facts: inner.facts,
        }
    }
}

/// Read-only view of a drained run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub totals: BTreeMap<(Provider, Metric), u64>,
    /// Descending by count, ties in catalog order
    pub rankings: BTreeMap<(Provider, Metric), Vec<(String, u64)>>,
    pub facts: u64,
}

impl AggregateSnapshot {
    pub fn total(&self, provider: Provider, metric: Metric) -> u64 {
        self.totals.get(&(provider, metric)).copied().unwrap_or(0)
    }

    pub fn ranking(&self, provider: Provider, metric: Metric) -> &[(String, u64)] {
        self.rankings
            .get(&(provider, metric))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any fact for `provider` was recorded
    pub fn has_provider(&self, provider: Provider) -> bool {
        self.totals.keys().any(|(p, _)| *p == provider)
    }
}
