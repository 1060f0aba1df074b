//! Element cache
//!
//! Maps `(element type, element id, site id)` to the result of looking the
//! element up. Absence of a key means "not looked up yet"; an explicit
//! [`ElementCacheEntry::Missing`] means "looked up and not found", so the
//! element is not queried again. Entries live until the element is saved or
//! deleted; they are removed, never marked stale.
//!
//! Store lookups run without holding the lock. Every invalidation bumps a
//! generation counter and stamps the element with it, and results read
//! before that stamp are discarded instead of cached.

use super::{CacheKey, ElementId, ElementStore, ElementSummary, ElementType, SiteId};
use crate::batch::{PreloadReport, RenderBatch};
use crate::cache::CacheStrategy;
use crate::error::Result;
use crate::events::InvalidationEvents;
use crate::sync::RwLockExt;
use log::debug;
use lru::LruCache;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// The parts of an element a link needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub url: Option<String>,
}

/// Cached lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCacheEntry {
    Found(ResolvedElement),
    Missing,
}

impl ElementCacheEntry {
    /// Build a found entry, asking the store for URI and URL.
    pub fn from_summary(store: &dyn ElementStore, element: &ElementSummary) -> Self {
        ElementCacheEntry::Found(ResolvedElement {
            title: element.title.clone(),
            uri: store.element_uri(element),
            url: store.element_url(element),
        })
    }

    pub fn exists(&self) -> bool {
        matches!(self, ElementCacheEntry::Found(_))
    }
}

enum EntryStore {
    Full(HashMap<CacheKey, ElementCacheEntry>),
    Lru(LruCache<CacheKey, ElementCacheEntry>),
    Disabled,
}

/// Invalidation stamps kept before they are folded into the floor.
const MAX_STAMPS: usize = 4096;

/// Lookups of one key before giving up on caching it.
const MAX_LOOKUP_ATTEMPTS: usize = 3;

/// Tombstones of deleted elements kept under the unbounded strategy.
const MAX_TOMBSTONES: usize = 10_000;

struct CacheState {
    entries: EntryStore,
    /// Sites cached per element, so a save can drop every site at once.
    /// May list sites the LRU already evicted.
    sites: HashMap<(ElementType, ElementId), BTreeSet<SiteId>>,
    /// Bumped by every invalidation
    generation: u64,
    /// Generation at which each element was last invalidated
    stamps: HashMap<(ElementType, ElementId), u64>,
    /// Results read before this generation are discarded; stamps older than
    /// it have been dropped
    floor: u64,
    /// Deletion order of tombstones, oldest first
    tombstones: VecDeque<CacheKey>,
    tombstone_limit: usize,
}

impl CacheState {
    fn new(entries: EntryStore) -> Self {
        Self {
            entries,
            sites: HashMap::new(),
            generation: 0,
            stamps: HashMap::new(),
            floor: 0,
            tombstones: VecDeque::new(),
            tombstone_limit: MAX_TOMBSTONES,
        }
    }

    fn stamp(&mut self, element_type: &ElementType, element_id: ElementId) {
        self.generation += 1;
        if self.stamps.len() >= MAX_STAMPS {
            self.stamps.clear();
            self.floor = self.generation;
        }
        self.stamps
            .insert((element_type.clone(), element_id), self.generation);
    }

    fn stamp_all(&mut self) {
        self.generation += 1;
        self.stamps.clear();
        self.floor = self.generation;
    }

    /// Whether a lookup started at generation `since` is still current for
    /// the key's element.
    fn is_fresh(&self, key: &CacheKey, since: u64) -> bool {
        if since < self.floor {
            return false;
        }
        self.stamps
            .get(&(key.element_type.clone(), key.element_id))
            .is_none_or(|stamp| *stamp <= since)
    }

    fn bury(&mut self, key: CacheKey) {
        self.insert(key.clone(), ElementCacheEntry::Missing);
        if !matches!(self.entries, EntryStore::Full(_)) {
            return;
        }
        self.tombstones.push_back(key);
        while self.tombstones.len() > self.tombstone_limit {
            let Some(oldest) = self.tombstones.pop_front() else {
                break;
            };
            // Only drop it if the element was not looked up again since
            if self.peek(&oldest) == Some(&ElementCacheEntry::Missing) {
                self.remove(&oldest);
            }
        }
    }

    fn peek(&self, key: &CacheKey) -> Option<&ElementCacheEntry> {
        match &self.entries {
            EntryStore::Full(map) => map.get(key),
            EntryStore::Lru(lru) => lru.peek(key),
            EntryStore::Disabled => None,
        }
    }

    fn index(&mut self, key: &CacheKey) {
        self.sites
            .entry((key.element_type.clone(), key.element_id))
            .or_default()
            .insert(key.site_id);
    }

    fn unindex(&mut self, key: &CacheKey) {
        let element = (key.element_type.clone(), key.element_id);
        if let Some(sites) = self.sites.get_mut(&element) {
            sites.remove(&key.site_id);
            if sites.is_empty() {
                self.sites.remove(&element);
            }
        }
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        let removed = match &mut self.entries {
            EntryStore::Full(map) => map.remove(key).is_some(),
            EntryStore::Lru(lru) => lru.pop(key).is_some(),
            EntryStore::Disabled => false,
        };
        self.unindex(key);
        removed
    }

    fn insert(&mut self, key: CacheKey, entry: ElementCacheEntry) {
        let evicted = match &mut self.entries {
            EntryStore::Full(map) => {
                map.insert(key.clone(), entry);
                None
            }
            // push hands back either the replaced value of this key or the evicted LRU entry
            EntryStore::Lru(lru) => lru
                .push(key.clone(), entry)
                .map(|(evicted_key, _)| evicted_key)
                .filter(|evicted_key| evicted_key != &key),
            EntryStore::Disabled => return,
        };

        if let Some(evicted_key) = evicted {
            debug!("Evicted element {evicted_key} from the link cache");
            self.unindex(&evicted_key);
        }
        self.index(&key);
    }
}

/// Process-scoped cache of element lookups for element links.
pub struct ElementCache {
    strategy: CacheStrategy,
    state: RwLock<CacheState>,
    events: Arc<InvalidationEvents>,
}

impl ElementCache {
    /// Create a cache with the given strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCacheStrategy`](crate::Error::InvalidCacheStrategy)
    /// for an LRU strategy of size 0.
    pub fn new(strategy: CacheStrategy, events: Arc<InvalidationEvents>) -> Result<Self> {
        strategy.validate()?;
        let entries = match strategy.lru_capacity() {
            Some(capacity) => EntryStore::Lru(LruCache::new(capacity)),
            None if strategy == CacheStrategy::None => EntryStore::Disabled,
            None => EntryStore::Full(HashMap::new()),
        };

        Ok(Self {
            strategy,
            state: RwLock::new(CacheState::new(entries)),
            events,
        })
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Look up a key, marking it recently used under the LRU strategy.
    pub fn get(&self, key: &CacheKey) -> Option<ElementCacheEntry> {
        if matches!(self.strategy, CacheStrategy::Lru(_)) {
            let mut state = self.state.write_recovered();
            return match &mut state.entries {
                EntryStore::Lru(lru) => lru.get(key).cloned(),
                _ => None,
            };
        }

        let state = self.state.read_recovered();
        match &state.entries {
            EntryStore::Full(map) => map.get(key).cloned(),
            _ => None,
        }
    }

    /// Whether the key has been looked up, without touching LRU order.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let state = self.state.read_recovered();
        match &state.entries {
            EntryStore::Full(map) => map.contains_key(key),
            EntryStore::Lru(lru) => lru.contains(key),
            EntryStore::Disabled => false,
        }
    }

    pub fn put(&self, key: CacheKey, entry: ElementCacheEntry) {
        self.state.write_recovered().insert(key, entry);
    }

    /// Current invalidation generation. Read it before querying the store
    /// and hand it to [`put_if_fresh`](Self::put_if_fresh) with the result.
    pub fn generation(&self) -> u64 {
        self.state.read_recovered().generation
    }

    /// Cache a lookup result unless its element was invalidated after
    /// generation `since`. Returns `false` when the result was discarded as
    /// stale.
    pub fn put_if_fresh(&self, key: CacheKey, entry: ElementCacheEntry, since: u64) -> bool {
        let mut state = self.state.write_recovered();
        if !state.is_fresh(&key, since) {
            debug!("Discarded lookup of {key}: invalidated while it ran");
            return false;
        }
        state.insert(key, entry);
        true
    }

    /// Remove one entry. Returns whether anything was cached for it.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = {
            let mut state = self.state.write_recovered();
            state.stamp(&key.element_type, key.element_id);
            state.remove(key)
        };
        if removed {
            self.events.notify_element(key);
        }
        removed
    }

    /// Drop every cached site of a saved element.
    ///
    /// `site_ids` are the sites the element is enabled in; sites cached
    /// earlier under which the element is no longer enabled are dropped too.
    /// Returns the number of entries removed.
    pub fn on_save_element(
        &self,
        element_type: &ElementType,
        element_id: ElementId,
        site_ids: &[SiteId],
    ) -> usize {
        let removed = self.remove_element(element_type, element_id, site_ids);
        debug!(
            "Invalidated {} cached site(s) of saved element {element_type}:{element_id}",
            removed.len()
        );
        self.notify(&removed);
        removed.len()
    }

    /// Drop every cached site of a deleted element and remember it as
    /// missing on the affected sites, so later resolutions render nothing
    /// without querying.
    pub fn on_delete_element(
        &self,
        element_type: &ElementType,
        element_id: ElementId,
        site_ids: &[SiteId],
    ) -> usize {
        let removed = {
            let mut state = self.state.write_recovered();
            let removed = Self::remove_element_locked(&mut state, element_type, element_id, site_ids);

            let tombstones: BTreeSet<SiteId> = site_ids
                .iter()
                .copied()
                .chain(removed.iter().map(|key| key.site_id))
                .collect();
            for site_id in tombstones {
                state.bury(CacheKey::new(element_type.clone(), element_id, site_id));
            }
            removed
        };

        debug!(
            "Invalidated {} cached site(s) of deleted element {element_type}:{element_id}",
            removed.len()
        );
        self.notify(&removed);
        removed.len()
    }

    /// Look one key up in the store and cache the result.
    ///
    /// This is the fallback for keys no render batch preloaded. When the
    /// element is invalidated while the query runs, the result is dropped
    /// and the lookup repeated, so a stale element is never cached.
    ///
    /// # Errors
    ///
    /// Returns the store's error; nothing is cached in that case.
    pub fn resolve_single(
        &self,
        key: &CacheKey,
        store: &dyn ElementStore,
    ) -> Result<ElementCacheEntry> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let since = self.generation();
            let entry = Self::lookup(key, store)?;

            if self.put_if_fresh(key.clone(), entry.clone(), since) {
                return Ok(entry);
            }
            // A delete leaves a tombstone behind; a save leaves nothing
            if let Some(current) = self.get(key) {
                return Ok(current);
            }
            if attempts >= MAX_LOOKUP_ATTEMPTS {
                debug!("Element {key} keeps changing, serving the last lookup uncached");
                return Ok(entry);
            }
        }
    }

    fn lookup(key: &CacheKey, store: &dyn ElementStore) -> Result<ElementCacheEntry> {
        let found = store.find_elements(&key.element_type, &[key.element_id], key.site_id)?;
        Ok(found
            .iter()
            .find(|element| element.id == key.element_id && element.site_id == key.site_id)
            .map_or(ElementCacheEntry::Missing, |element| {
                ElementCacheEntry::from_summary(store, element)
            }))
    }

    /// Resolve everything a render batch collected, in as few queries as
    /// possible. Called once per page, right before output starts.
    pub fn preload_cache(&self, batch: &mut RenderBatch, store: &dyn ElementStore) -> PreloadReport {
        batch.flush(self, store)
    }

    pub fn len(&self) -> usize {
        let state = self.state.read_recovered();
        match &state.entries {
            EntryStore::Full(map) => map.len(),
            EntryStore::Lru(lru) => lru.len(),
            EntryStore::Disabled => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.write_recovered();
        match &mut state.entries {
            EntryStore::Full(map) => map.clear(),
            EntryStore::Lru(lru) => lru.clear(),
            EntryStore::Disabled => {}
        }
        state.sites.clear();
        state.tombstones.clear();
        state.stamp_all();
    }

    fn remove_element(
        &self,
        element_type: &ElementType,
        element_id: ElementId,
        site_ids: &[SiteId],
    ) -> Vec<CacheKey> {
        let mut state = self.state.write_recovered();
        Self::remove_element_locked(&mut state, element_type, element_id, site_ids)
    }

    fn remove_element_locked(
        state: &mut CacheState,
        element_type: &ElementType,
        element_id: ElementId,
        site_ids: &[SiteId],
    ) -> Vec<CacheKey> {
        state.stamp(element_type, element_id);
        let mut sites: BTreeSet<SiteId> = state
            .sites
            .get(&(element_type.clone(), element_id))
            .cloned()
            .unwrap_or_default();
        sites.extend(site_ids.iter().copied());

        sites
            .into_iter()
            .map(|site_id| CacheKey::new(element_type.clone(), element_id, site_id))
            .filter(|key| state.remove(key))
            .collect()
    }

    fn notify(&self, keys: &[CacheKey]) {
        for key in keys {
            self.events.notify_element(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::MemoryElementStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Answers the first query with what the store held before the element
    /// changed, the way a slow query overlaps an authoring request.
    struct OverlappingStore<'a> {
        inner: MemoryElementStore,
        cache: &'a ElementCache,
        delete: bool,
        changed: AtomicBool,
    }

    impl<'a> OverlappingStore<'a> {
        fn new(cache: &'a ElementCache, delete: bool) -> Self {
            let inner = MemoryElementStore::new();
            inner.insert(summary(42, "Before"));
            Self {
                inner,
                cache,
                delete,
                changed: AtomicBool::new(false),
            }
        }
    }

    impl ElementStore for OverlappingStore<'_> {
        fn find_elements(
            &self,
            element_type: &ElementType,
            ids: &[ElementId],
            site_id: SiteId,
        ) -> Result<Vec<ElementSummary>> {
            let snapshot = self.inner.find_elements(element_type, ids, site_id)?;
            if !self.changed.swap(true, Ordering::SeqCst) {
                if self.delete {
                    self.inner.remove_everywhere(element_type, ElementId(42));
                    self.cache.on_delete_element(element_type, ElementId(42), &[site_id]);
                } else {
                    self.inner.insert(summary(42, "After"));
                    self.cache.on_save_element(element_type, ElementId(42), &[site_id]);
                }
            }
            Ok(snapshot)
        }
    }

    fn summary(id: u64, title: &str) -> ElementSummary {
        ElementSummary::new(ElementType::entry(), id, 1)
            .with_title(title)
            .with_uri(title.to_lowercase())
            .with_url(format!("https://example.com/{}", title.to_lowercase()))
    }

    fn key(id: u64, site: u64) -> CacheKey {
        CacheKey::new(ElementType::entry(), ElementId(id), SiteId(site))
    }

    fn found(title: &str) -> ElementCacheEntry {
        ElementCacheEntry::Found(ResolvedElement {
            title: Some(title.into()),
            uri: Some(title.to_lowercase()),
            url: Some(format!("https://example.com/{}", title.to_lowercase())),
        })
    }

    fn cache(strategy: CacheStrategy) -> ElementCache {
        ElementCache::new(strategy, Arc::new(InvalidationEvents::new())).unwrap()
    }

    #[test]
    fn test_put_get_invalidate() {
        let cache = cache(CacheStrategy::Full);
        cache.put(key(1, 1), found("One"));
        cache.put(key(2, 1), ElementCacheEntry::Missing);

        assert_eq!(cache.get(&key(1, 1)), Some(found("One")));
        assert_eq!(cache.get(&key(2, 1)), Some(ElementCacheEntry::Missing));
        assert_eq!(cache.get(&key(3, 1)), None);

        assert!(cache.invalidate(&key(1, 1)));
        assert!(!cache.invalidate(&key(1, 1)));
        assert_eq!(cache.get(&key(1, 1)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_save_invalidates_all_cached_sites_only_for_that_element() {
        let events = Arc::new(InvalidationEvents::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        events.on_element_invalidated(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        let cache = ElementCache::new(CacheStrategy::Full, events).unwrap();

        cache.put(key(1, 1), found("One"));
        cache.put(key(1, 2), found("Uno"));
        cache.put(key(1, 3), found("Un"));
        cache.put(key(2, 1), found("Two"));

        // Enabled only on site 1 now, yet sites 2 and 3 were cached
        let removed = cache.on_save_element(&ElementType::entry(), ElementId(1), &[SiteId(1)]);

        assert_eq!(removed, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!cache.contains(&key(1, 1)));
        assert!(!cache.contains(&key(1, 2)));
        assert!(!cache.contains(&key(1, 3)));
        assert_eq!(cache.get(&key(2, 1)), Some(found("Two")));
    }

    #[test]
    fn test_delete_leaves_missing_entries() {
        let cache = cache(CacheStrategy::Full);
        cache.put(key(42, 1), found("Answer"));
        cache.put(key(42, 2), found("Antwort"));

        let removed = cache.on_delete_element(&ElementType::entry(), ElementId(42), &[SiteId(1)]);

        assert_eq!(removed, 2);
        assert_eq!(cache.get(&key(42, 1)), Some(ElementCacheEntry::Missing));
        assert_eq!(cache.get(&key(42, 2)), Some(ElementCacheEntry::Missing));
    }

    #[test]
    fn test_save_after_delete_clears_missing_entries() {
        let cache = cache(CacheStrategy::Full);
        cache.on_delete_element(&ElementType::entry(), ElementId(7), &[SiteId(1)]);
        assert_eq!(cache.get(&key(7, 1)), Some(ElementCacheEntry::Missing));

        cache.on_save_element(&ElementType::entry(), ElementId(7), &[SiteId(1)]);
        assert_eq!(cache.get(&key(7, 1)), None);
    }

    #[test]
    fn test_lru_evicts_and_keeps_index_consistent() {
        let cache = cache(CacheStrategy::Lru(2));
        cache.put(key(1, 1), found("One"));
        cache.put(key(2, 1), found("Two"));
        // Touch 1 so 2 becomes least recently used
        assert!(cache.get(&key(1, 1)).is_some());
        cache.put(key(3, 1), found("Three"));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(1, 1)));
        assert!(!cache.contains(&key(2, 1)));
        assert_eq!(cache.on_save_element(&ElementType::entry(), ElementId(2), &[]), 0);
        assert_eq!(cache.on_save_element(&ElementType::entry(), ElementId(3), &[]), 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = cache(CacheStrategy::None);
        cache.put(key(1, 1), found("One"));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1, 1)), None);
    }

    #[test]
    fn test_zero_sized_lru_rejected() {
        let result = ElementCache::new(CacheStrategy::Lru(0), Arc::new(InvalidationEvents::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_clear() {
        let cache = cache(CacheStrategy::Full);
        cache.put(key(1, 1), found("One"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.on_save_element(&ElementType::entry(), ElementId(1), &[]), 0);
    }

    #[test]
    fn test_delete_during_lookup_wins() {
        let cache = cache(CacheStrategy::Full);
        let store = OverlappingStore::new(&cache, true);

        let entry = cache.resolve_single(&key(42, 1), &store).unwrap();

        assert_eq!(entry, ElementCacheEntry::Missing);
        assert_eq!(cache.get(&key(42, 1)), Some(ElementCacheEntry::Missing));
    }

    #[test]
    fn test_delete_during_preload_wins() {
        let cache = cache(CacheStrategy::Full);
        let store = OverlappingStore::new(&cache, true);
        let mut batch = RenderBatch::new();
        batch.record_pending_link(ElementType::entry(), ElementId(42), SiteId(1));

        let report = cache.preload_cache(&mut batch, &store);

        assert_eq!(report.discarded, 1);
        assert_eq!(report.found, 0);
        assert_eq!(cache.get(&key(42, 1)), Some(ElementCacheEntry::Missing));
    }

    #[test]
    fn test_save_during_lookup_reloads() {
        let cache = cache(CacheStrategy::Full);
        let store = OverlappingStore::new(&cache, false);

        let entry = cache.resolve_single(&key(42, 1), &store).unwrap();

        let expected = ElementCacheEntry::from_summary(&store, &summary(42, "After"));
        assert_eq!(entry, expected);
        assert_eq!(cache.get(&key(42, 1)), Some(expected));
        assert_eq!(store.inner.query_count(), 2);
    }

    #[test]
    fn test_populated_element_changed_before_flush() {
        let cache = cache(CacheStrategy::Full);
        let store = MemoryElementStore::new();
        let mut batch = RenderBatch::new().starting_at(cache.generation());
        batch.record_element_populated(&summary(42, "Before"));
        batch.record_element_populated(&summary(43, "Other"));
        batch.record_pending_link(ElementType::entry(), ElementId(42), SiteId(1));
        batch.record_pending_link(ElementType::entry(), ElementId(43), SiteId(1));

        cache.on_save_element(&ElementType::entry(), ElementId(42), &[SiteId(1)]);
        let report = batch.flush(&cache, &store);

        assert_eq!(report.discarded, 1);
        assert_eq!(report.from_populated, 1);
        assert_eq!(cache.get(&key(42, 1)), None);
        assert!(cache.contains(&key(43, 1)));
        assert_eq!(store.query_count(), 0);
    }

    #[test]
    fn test_unrelated_invalidation_keeps_lookup() {
        let cache = cache(CacheStrategy::Full);
        let since = cache.generation();
        cache.on_save_element(&ElementType::entry(), ElementId(7), &[SiteId(1)]);

        assert!(cache.put_if_fresh(key(1, 1), found("One"), since));
        assert!(!cache.put_if_fresh(key(7, 1), found("Seven"), since));
        assert!(cache.put_if_fresh(key(7, 1), found("Seven"), cache.generation()));
    }

    #[test]
    fn test_clear_discards_running_lookups() {
        let cache = cache(CacheStrategy::Full);
        let since = cache.generation();
        cache.clear();
        assert!(!cache.put_if_fresh(key(1, 1), found("One"), since));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_tombstones_are_bounded() {
        let cache = cache(CacheStrategy::Full);
        cache.state.write_recovered().tombstone_limit = 2;

        for id in [1, 2, 3] {
            cache.on_delete_element(&ElementType::entry(), ElementId(id), &[SiteId(1)]);
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(1, 1)));
        assert_eq!(cache.get(&key(3, 1)), Some(ElementCacheEntry::Missing));
        // Dropping a tombstone also drops its site index
        assert_eq!(cache.on_save_element(&ElementType::entry(), ElementId(1), &[]), 0);
    }
}
