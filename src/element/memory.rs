//! In-memory element store
//!
//! Useful for hosts without a database and for tests: every call to
//! `find_elements` is recorded so query counts can be asserted.

use super::{CacheKey, ElementId, ElementStore, ElementSummary, ElementType, SiteId};
use crate::error::{Error, Result};
use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// One recorded bulk lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub element_type: ElementType,
    pub ids: Vec<ElementId>,
    pub site_id: SiteId,
}

/// Element store backed by a map.
#[derive(Default)]
pub struct MemoryElementStore {
    elements: RwLock<HashMap<CacheKey, ElementSummary>>,
    queries: RwLock<Vec<StoreQuery>>,
    failing: AtomicBool,
}

impl MemoryElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an element.
    pub fn insert(&self, element: ElementSummary) {
        self.elements
            .write_recovered()
            .insert(element.cache_key(), element);
    }

    /// Remove an element from one site.
    pub fn remove(&self, key: &CacheKey) -> Option<ElementSummary> {
        self.elements.write_recovered().remove(key)
    }

    /// Remove an element from every site it exists on, returning those sites.
    pub fn remove_everywhere(&self, element_type: &ElementType, id: ElementId) -> Vec<SiteId> {
        let mut elements = self.elements.write_recovered();
        let mut sites: Vec<SiteId> = elements
            .keys()
            .filter(|key| &key.element_type == element_type && key.element_id == id)
            .map(|key| key.site_id)
            .collect();
        sites.sort();
        for site_id in &sites {
            elements.remove(&CacheKey::new(element_type.clone(), id, *site_id));
        }
        sites
    }

    /// Make subsequent queries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All lookups performed so far, in call order.
    pub fn queries(&self) -> Vec<StoreQuery> {
        self.queries.read_recovered().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.read_recovered().len()
    }

    pub fn clear_queries(&self) {
        self.queries.write_recovered().clear();
    }
}

impl ElementStore for MemoryElementStore {
    fn find_elements(
        &self,
        element_type: &ElementType,
        ids: &[ElementId],
        site_id: SiteId,
    ) -> Result<Vec<ElementSummary>> {
        self.queries.write_recovered().push(StoreQuery {
            element_type: element_type.clone(),
            ids: ids.to_vec(),
            site_id,
        });

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ElementStore {
                element_type: element_type.clone(),
                reason: "store unavailable".into(),
            });
        }

        let elements = self.elements.read_recovered();
        Ok(ids
            .iter()
            .filter_map(|id| {
                elements
                    .get(&CacheKey::new(element_type.clone(), *id, site_id))
                    .cloned()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_records_queries() {
        let store = MemoryElementStore::new();
        store.insert(ElementSummary::new(ElementType::entry(), 5, 1).with_title("Five"));

        let found = store
            .find_elements(&ElementType::entry(), &[ElementId(5), ElementId(6)], SiteId(1))
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title.as_deref(), Some("Five"));
        assert_eq!(store.query_count(), 1);
        assert_eq!(store.queries()[0].ids, vec![ElementId(5), ElementId(6)]);
    }

    #[test]
    fn test_remove_everywhere() {
        let store = MemoryElementStore::new();
        store.insert(ElementSummary::new(ElementType::entry(), 5, 1));
        store.insert(ElementSummary::new(ElementType::entry(), 5, 2));
        store.insert(ElementSummary::new(ElementType::entry(), 6, 1));

        let sites = store.remove_everywhere(&ElementType::entry(), ElementId(5));
        assert_eq!(sites, vec![SiteId(1), SiteId(2)]);

        let found = store
            .find_elements(&ElementType::entry(), &[ElementId(5), ElementId(6)], SiteId(1))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryElementStore::new();
        store.set_failing(true);
        let err = store
            .find_elements(&ElementType::asset(), &[ElementId(1)], SiteId(1))
            .unwrap_err();
        assert!(matches!(err, Error::ElementStore { .. }));
        assert_eq!(store.query_count(), 1);
    }
}
