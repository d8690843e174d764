//! Per-call-site polymorphic rule caches.
//!
//! Each site holds a small list of [`Rule`]s, most recently used first. A lookup scans
//! the list for the first rule whose guard accepts the runtime type and whose catalog
//! version stamp is current.
//!
//! # Thread Safety
//!
//! A site publishes its rules as an immutable snapshot behind an [`ArcSwap`]. Readers
//! load the current snapshot pointer atomically and scan it; they take no lock and
//! never wait for a writer. Writers serialize on a per-site mutex, build a new snapshot
//! and store it. A reader may miss a rule recorded concurrently and resolve again.
//!
//! Sites are created by [`CallSiteCache::open`] or [`CallSiteCache::record`]; a lookup
//! at a site that does not exist misses without creating it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dynbind_core::TypeHash;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use tracing::debug;

use crate::catalog::CatalogVersion;
use crate::rule::Rule;

/// Identity of one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteId(pub u64);

impl From<TypeHash> for SiteId {
    fn from(hash: TypeHash) -> Self {
        SiteId(hash.as_u64())
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{:x}", self.0)
    }
}

/// Hit and miss counters for one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub hits: u64,
    pub misses: u64,
}

type Snapshot = Arc<Vec<Arc<Rule>>>;

struct CallSite {
    rules: ArcSwap<Vec<Arc<Rule>>>,
    writer: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for CallSite {
    fn default() -> Self {
        Self {
            rules: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl CallSite {
    fn snapshot(&self) -> Snapshot {
        self.rules.load_full()
    }

    /// Callers hold `writer`.
    fn publish(&self, rules: Vec<Arc<Rule>>) {
        self.rules.store(Arc::new(rules));
    }
}

/// Bounded, most-recently-used-first rule caches keyed by call site.
pub struct CallSiteCache {
    sites: DashMap<SiteId, Arc<CallSite>, FxBuildHasher>,
    capacity: usize,
    promote_on_hit: bool,
    version: CatalogVersion,
}

impl CallSiteCache {
    /// Create a cache holding at most `capacity` rules per site.
    ///
    /// Rules stamped with a version other than `version.current()` are never returned.
    pub fn new(capacity: usize, promote_on_hit: bool, version: CatalogVersion) -> Self {
        Self {
            sites: DashMap::with_hasher(FxBuildHasher),
            capacity: capacity.max(1),
            promote_on_hit,
            version,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn site(&self, id: SiteId) -> Arc<CallSite> {
        if let Some(site) = self.sites.get(&id) {
            return Arc::clone(site.value());
        }
        Arc::clone(self.sites.entry(id).or_default().value())
    }

    /// Create an empty site at `id` if none exists.
    pub fn open(&self, id: SiteId) {
        self.site(id);
    }

    /// Drop the site at `id` with its rules and counters.
    ///
    /// Returns false if no such site existed.
    pub fn remove(&self, id: SiteId) -> bool {
        let removed = self.sites.remove(&id).is_some();
        if removed {
            debug!(site = %id, "released call site");
        }
        removed
    }

    /// The first cached rule at `id` whose guard accepts `runtime_type`.
    ///
    /// A site that was never opened or recorded to has no rules and no counters.
    pub fn lookup(&self, id: SiteId, runtime_type: TypeHash) -> Option<Arc<Rule>> {
        let site = Arc::clone(self.sites.get(&id)?.value());
        let current = self.version.current();
        let snapshot = site.snapshot();

        let found = snapshot.iter().enumerate().find(|(_, rule)| {
            rule.catalog_version() == current && rule.guard_accepts(runtime_type)
        });

        match found {
            Some((index, rule)) => {
                site.hits.fetch_add(1, Ordering::Relaxed);
                let rule = Arc::clone(rule);
                if index > 0 && self.promote_on_hit {
                    Self::promote(&site, &rule);
                }
                Some(rule)
            }
            None => {
                site.misses.fetch_add(1, Ordering::Relaxed);
                debug!(site = %id, runtime_type = %runtime_type, "call-site cache miss");
                None
            }
        }
    }

    /// Move a hit rule to the front, unless another writer holds the site.
    fn promote(site: &CallSite, rule: &Arc<Rule>) {
        let Some(_writer) = site.writer.try_lock() else {
            return;
        };
        let snapshot = site.snapshot();
        let Some(index) = snapshot.iter().position(|r| Arc::ptr_eq(r, rule)) else {
            return;
        };
        let mut rules = snapshot.to_vec();
        let hit = rules.remove(index);
        rules.insert(0, hit);
        site.publish(rules);
    }

    /// Prepend `rule` at `id`, evicting least-recently-used rules beyond capacity.
    ///
    /// Stale rules are dropped, as is an existing rule with the same guard.
    pub fn record(&self, id: SiteId, rule: Arc<Rule>) {
        let site = self.site(id);
        let _writer = site.writer.lock();
        let current = self.version.current();

        let snapshot = site.snapshot();
        let mut rules = Vec::with_capacity(self.capacity);
        rules.push(rule);

        let mut stale = 0usize;
        for existing in snapshot.iter() {
            if existing.catalog_version() != current {
                stale += 1;
                continue;
            }
            if existing.guard() == rules[0].guard() {
                continue;
            }
            rules.push(Arc::clone(existing));
        }

        let evicted = rules.len().saturating_sub(self.capacity);
        rules.truncate(self.capacity);

        if stale > 0 {
            debug!(site = %id, stale, "purged stale rules");
        }
        if evicted > 0 {
            debug!(site = %id, evicted, capacity = self.capacity, "evicted rules");
        }
        site.publish(rules);
    }

    /// Drop every rule cached at `id`.
    pub fn invalidate_all(&self, id: SiteId) {
        if let Some(site) = self.sites.get(&id).map(|s| Arc::clone(s.value())) {
            let _writer = site.writer.lock();
            site.publish(Vec::new());
            debug!(site = %id, "invalidated call site");
        }
    }

    /// Drop every rule at every site.
    pub fn invalidate_everything(&self) {
        let sites: Vec<Arc<CallSite>> = self
            .sites
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for site in &sites {
            let _writer = site.writer.lock();
            site.publish(Vec::new());
        }
        debug!(sites = sites.len(), "invalidated all call sites");
    }

    /// Rules currently cached at `id`, most recently used first.
    pub fn rules(&self, id: SiteId) -> Vec<Arc<Rule>> {
        match self.sites.get(&id) {
            Some(site) => site.snapshot().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn stats(&self, id: SiteId) -> SiteStats {
        match self.sites.get(&id) {
            Some(site) => SiteStats {
                hits: site.hits.load(Ordering::Relaxed),
                misses: site.misses.load(Ordering::Relaxed),
            },
            None => SiteStats::default(),
        }
    }

    /// Number of sites seen.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
