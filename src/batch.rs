//! Per-request render batch
//!
//! While a page is being prepared the host reports every element it loads
//! and every element link it encounters. Right before the first byte of
//! output, [`ElementCache::preload_cache`] flushes the batch: links to
//! elements the page already loaded are cached straight from those
//! elements, the rest are looked up with one query per
//! `(element type, site)` group.

use crate::element::{
    CacheKey, ElementCache, ElementCacheEntry, ElementId, ElementStore, ElementSummary,
    ElementType, SiteId,
};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Kind of request a page render belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Front-end site request
    Site,
    /// Authoring / admin request
    ControlPanel,
    /// Console command
    Console,
}

/// What one flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Bulk queries issued, one per `(element type, site)` group
    pub queries: usize,
    /// Entries cached from the store as found
    pub found: usize,
    /// Entries cached as missing
    pub missing: usize,
    /// Entries cached from elements the page had already loaded
    pub from_populated: usize,
    /// Pending keys skipped because the cache already knew them
    pub already_cached: usize,
    /// Groups whose query failed; their keys stay unresolved
    pub failed_groups: usize,
    /// Results dropped because their element was invalidated meanwhile
    pub discarded: usize,
}

/// Request-scoped accumulation of element links awaiting resolution.
#[derive(Debug, Default)]
pub struct RenderBatch {
    active: bool,
    /// Elements the page loaded in full
    populated: HashMap<CacheKey, ElementSummary>,
    /// Links to elements the page loaded, resolvable without a query
    from_populated: BTreeSet<CacheKey>,
    /// Links that need a store lookup
    pending: BTreeSet<CacheKey>,
    flushes: usize,
    /// Cache generation when the page started loading elements
    since: Option<u64>,
}

impl RenderBatch {
    /// A live batch for one page render.
    pub fn new() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    /// A batch that records nothing; used outside site rendering.
    pub fn inert() -> Self {
        Self::default()
    }

    /// Only successful site requests collect links; authoring, console and
    /// error responses get an inert batch.
    pub fn for_request(kind: RequestKind, response_ok: bool) -> Self {
        if kind == RequestKind::Site && response_ok {
            Self::new()
        } else {
            Self::inert()
        }
    }

    /// Tie the batch to the cache generation at the start of the render.
    ///
    /// Elements the page loaded before an invalidation of that element are
    /// then not cached on flush. Without it, the generation at flush time
    /// is used.
    #[must_use]
    pub fn starting_at(mut self, generation: u64) -> Self {
        self.since = Some(generation);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record an element the page loaded for rendering.
    pub fn record_element_populated(&mut self, element: &ElementSummary) {
        if !self.active {
            return;
        }
        let key = element.cache_key();
        if self.pending.remove(&key) {
            self.from_populated.insert(key.clone());
        }
        self.populated.insert(key, element.clone());
    }

    /// Record an element link seen before output starts.
    pub fn record_pending_link(
        &mut self,
        element_type: ElementType,
        element_id: ElementId,
        site_id: SiteId,
    ) {
        if !self.active {
            return;
        }
        if self.flushes > 0 {
            debug!("Element link {element_type}:{element_id}@{site_id} recorded after preload");
        }
        let key = CacheKey::new(element_type, element_id, site_id);
        if self.populated.contains_key(&key) {
            self.from_populated.insert(key);
        } else {
            self.pending.insert(key);
        }
    }

    /// Keys still waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.from_populated.len()
    }

    pub fn populated_len(&self) -> usize {
        self.populated.len()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushes > 0
    }

    /// Resolve every collected key into the cache.
    ///
    /// Flushing an empty batch is a no-op, so a second call issues no
    /// queries unless new links were recorded in between.
    pub fn flush(&mut self, cache: &ElementCache, store: &dyn ElementStore) -> PreloadReport {
        let mut report = PreloadReport::default();
        if !self.active {
            return report;
        }
        self.flushes += 1;
        let flush_generation = cache.generation();
        let populated_since = self.since.unwrap_or(flush_generation);

        for key in std::mem::take(&mut self.from_populated) {
            if cache.contains(&key) {
                report.already_cached += 1;
                continue;
            }
            if let Some(element) = self.populated.get(&key) {
                let entry = ElementCacheEntry::from_summary(store, element);
                if cache.put_if_fresh(key, entry, populated_since) {
                    report.from_populated += 1;
                } else {
                    report.discarded += 1;
                }
            }
        }

        let mut groups: BTreeMap<(ElementType, SiteId), Vec<ElementId>> = BTreeMap::new();
        for key in std::mem::take(&mut self.pending) {
            if cache.contains(&key) {
                report.already_cached += 1;
                continue;
            }
            groups
                .entry((key.element_type, key.site_id))
                .or_default()
                .push(key.element_id);
        }

        for ((element_type, site_id), ids) in groups {
            let since = cache.generation();
            report.queries += 1;
            let elements = match store.find_elements(&element_type, &ids, site_id) {
                Ok(elements) => elements,
                Err(e) => {
                    warn!(
                        "Preloading {} {element_type} link(s) for site {site_id} failed: {e}",
                        ids.len()
                    );
                    report.failed_groups += 1;
                    continue;
                }
            };

            let mut by_id: HashMap<ElementId, &ElementSummary> = elements
                .iter()
                .filter(|element| element.site_id == site_id)
                .map(|element| (element.id, element))
                .collect();

            for id in ids {
                let key = CacheKey::new(element_type.clone(), id, site_id);
                let entry = by_id
                    .remove(&id)
                    .map_or(ElementCacheEntry::Missing, |element| {
                        ElementCacheEntry::from_summary(store, element)
                    });
                let exists = entry.exists();
                if !cache.put_if_fresh(key, entry, since) {
                    report.discarded += 1;
                } else if exists {
                    report.found += 1;
                } else {
                    report.missing += 1;
                }
            }
        }

        debug!(
            "Preloaded element links: {} queries, {} found, {} missing, {} from page elements",
            report.queries, report.found, report.missing, report.from_populated
        );
        report
    }
}
