//! Entity catalog: the whitelist every extracted name is checked against.
//!
//! Readers take an `Arc<CatalogSnapshot>` once per resolution and keep it
//! for the whole traversal. A refresh builds a complete new snapshot and
//! swaps the reference, so an in-flight resolution sees either the old or
//! the new inventory, never a mix.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time;

use crate::error::CatalogError;
use crate::inventory::{Inventory, InventorySource};
use crate::normalize::{bounded_distance, contains_fragment, normalize};

/// Shortest normalized input allowed to match by substring or prefix.
const MIN_PARTIAL_LEN: usize = 3;

/// Words that may surround a machine name without changing which machine
/// it denotes ("the HVAC unit").
const MACHINE_FILLER: &[&str] = &[
    "the", "a", "an", "my", "our", "unit", "machine", "system", "equipment", "please", "now",
    "currently", "right",
];

/// Qualifiers that may follow a metric token ("power consumption").
const METRIC_FILLER: &[&str] = &[
    "the", "consumption", "usage", "draw", "rate", "reading", "readings", "level", "value",
    "total", "current",
];

/// A canonical name with its precomputed normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogName {
    pub canonical: String,
    pub normalized: String,
}

/// Result of looking a raw value up in one of the catalog sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one entry matched; carries its canonical spelling.
    Found(String),
    /// Several entries matched; carries all of them.
    Ambiguous(Vec<String>),
    NotFound,
}

/// One whitelist (machines or metrics) with its lookup rules.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    names: Vec<CatalogName>,
    filler: &'static [&'static str],
}

impl NameSet {
    fn from_raw(raw: Vec<String>, filler: &'static [&'static str]) -> Self {
        let mut names: Vec<CatalogName> = raw
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .map(|canonical| CatalogName {
                normalized: normalize(&canonical),
                canonical,
            })
            .collect();
        names.sort_by(|a, b| a.canonical.cmp(&b.canonical));
        names.dedup_by(|a, b| a.canonical == b.canonical);
        Self { names, filler }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[CatalogName] {
        &self.names
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.canonical.as_str())
    }

    /// Exact match, then normalized match, then substring/prefix match.
    pub fn lookup(&self, raw: &str) -> Lookup {
        let raw = raw.trim();
        if raw.is_empty() {
            return Lookup::NotFound;
        }

        if let Some(hit) = self.names.iter().find(|n| n.canonical == raw) {
            return Lookup::Found(hit.canonical.clone());
        }

        let norm = normalize(raw);
        let normalized_hits: Vec<&CatalogName> =
            self.names.iter().filter(|n| n.normalized == norm).collect();
        if let Some(result) = Self::collapse(&normalized_hits) {
            return result;
        }

        if norm.chars().count() < MIN_PARTIAL_LEN {
            return Lookup::NotFound;
        }
        let partial_hits: Vec<&CatalogName> = self
            .names
            .iter()
            .filter(|n| {
                contains_fragment(&n.normalized, &norm)
                    || wrapped_in_filler(&norm, &n.normalized, self.filler)
            })
            .collect();
        Self::collapse(&partial_hits).unwrap_or(Lookup::NotFound)
    }

    /// Entries within `max_edits` of `raw`, closest first, ties by name.
    pub fn nearest(&self, raw: &str, max_edits: usize) -> Vec<(String, usize)> {
        let norm = normalize(raw);
        let mut hits: Vec<(String, usize)> = self
            .names
            .iter()
            .filter_map(|n| {
                bounded_distance(&norm, &n.normalized, max_edits).map(|d| (n.canonical.clone(), d))
            })
            .collect();
        hits.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        hits
    }

    fn collapse(hits: &[&CatalogName]) -> Option<Lookup> {
        match hits {
            [] => None,
            [one] => Some(Lookup::Found(one.canonical.clone())),
            many => Some(Lookup::Ambiguous(
                many.iter().map(|n| n.canonical.clone()).collect(),
            )),
        }
    }
}

/// True when `name` occurs in `norm` on separator boundaries and every
/// other token of `norm` is in `filler`. `"hvac-99"` and `"pump-7"` name
/// different machines than `"hvac"` and `"pump"`, so they never match.
fn wrapped_in_filler(norm: &str, name: &str, filler: &[&str]) -> bool {
    norm.match_indices(name).any(|(idx, _)| {
        let end = idx + name.len();
        let bounded = (idx == 0 || norm[..idx].ends_with('-'))
            && (end == norm.len() || norm[end..].starts_with('-'));
        bounded
            && norm[..idx]
                .split('-')
                .chain(norm[end..].split('-'))
                .filter(|t| !t.is_empty())
                .all(|t| filler.contains(&t))
    })
}

/// Immutable view of the inventory at one point in time.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    version: u64,
    refreshed_at: DateTime<Utc>,
    entities: NameSet,
    metrics: NameSet,
}

impl CatalogSnapshot {
    fn build(version: u64, inventory: Inventory) -> Self {
        Self {
            version,
            refreshed_at: Utc::now(),
            entities: NameSet::from_raw(inventory.entities, MACHINE_FILLER),
            metrics: NameSet::from_raw(inventory.metrics, METRIC_FILLER),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn entities(&self) -> &NameSet {
        &self.entities
    }

    pub fn metrics(&self) -> &NameSet {
        &self.metrics
    }
}

/// Process-wide, refreshable catalog handle.
#[derive(Debug)]
pub struct EntityCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl EntityCatalog {
    /// Catalog seeded with an initial inventory (version 1).
    pub fn new(inventory: Inventory) -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogSnapshot::build(1, inventory))),
        }
    }

    /// Catalog with nothing in it (version 0). Every machine name is rejected
    /// until the first successful refresh.
    pub fn empty() -> Self {
        Self::new_versioned(0, Inventory::default())
    }

    fn new_versioned(version: u64, inventory: Inventory) -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogSnapshot::build(version, inventory))),
        }
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a complete new inventory, returning the new version.
    ///
    /// An inventory without entities is refused and the previous snapshot
    /// stays in place.
    pub fn replace(&self, inventory: Inventory) -> Result<u64, CatalogError> {
        if inventory.entities.iter().all(|e| e.trim().is_empty()) {
            return Err(CatalogError::EmptyInventory);
        }

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = guard.version + 1;
        let snapshot = CatalogSnapshot::build(version, inventory);
        tracing::info!(
            version,
            entities = snapshot.entities.len(),
            metrics = snapshot.metrics.len(),
            "entity catalog replaced"
        );
        *guard = Arc::new(snapshot);
        Ok(version)
    }

    /// Pull a fresh inventory from `source` and install it.
    ///
    /// On failure the stale snapshot keeps serving.
    pub async fn refresh(&self, source: &dyn InventorySource) -> Result<u64, CatalogError> {
        match source.fetch().await {
            Ok(inventory) => self.replace(inventory),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = source.source_name(),
                    stale_version = self.snapshot().version,
                    "catalog refresh failed, keeping stale catalog"
                );
                Err(e)
            }
        }
    }
}

/// Re-pull the inventory every `interval`.
///
/// Runs forever; intended to be spawned or raced in a `select!`.
pub async fn refresh_loop(
    catalog: Arc<EntityCatalog>,
    source: Arc<dyn InventorySource>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    // Skip the first tick (fires immediately).
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Ok(version) = catalog.refresh(source.as_ref()).await {
            tracing::debug!(version, "scheduled catalog refresh complete");
        }
    }
}
