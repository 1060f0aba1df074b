//! Lifecycle events and invalidation listeners
//!
//! [`LifecycleEvent`] is what the host feeds into
//! [`LinkManager::handle_event`](crate::LinkManager::handle_event) from its
//! authoring side. [`InvalidationEvents`] lets the host react when the caches
//! drop entries (for example to purge its own rendered-page caches).

use crate::element::{CacheKey, ElementId, ElementType, SiteId};
use crate::field::{BlockTypeId, ConfigEvent, FieldId};
use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Authoring-side occurrences that affect cached link data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// An element was saved; `site_ids` are the sites it is enabled in.
    ElementSaved {
        element_type: ElementType,
        element_id: ElementId,
        site_ids: Vec<SiteId>,
    },
    /// An element was deleted from `site_ids`.
    ElementDeleted {
        element_type: ElementType,
        element_id: ElementId,
        site_ids: Vec<SiteId>,
    },
    FieldSaved(FieldId),
    FieldDeleted(FieldId),
    BlockTypeSaved(BlockTypeId),
    BlockTypeDeleted(BlockTypeId),
    /// A project-config change keyed by UID.
    Config(ConfigEvent),
}

/// Type alias for an element invalidation callback
pub type ElementCallback = Arc<dyn Fn(&CacheKey) + Send + Sync>;

/// Type alias for a field invalidation callback
pub type FieldCallback = Arc<dyn Fn(FieldId) + Send + Sync>;

/// Listeners notified after cache entries are invalidated
pub struct InvalidationEvents {
    /// Called for every invalidated element entry
    element_listeners: RwLock<Vec<ElementCallback>>,

    /// Called only for entries of one element type
    type_listeners: RwLock<HashMap<ElementType, Vec<ElementCallback>>>,

    /// Called for every invalidated field
    field_listeners: RwLock<Vec<FieldCallback>>,
}

impl InvalidationEvents {
    #[must_use]
    pub fn new() -> Self {
        Self {
            element_listeners: RwLock::new(Vec::new()),
            type_listeners: RwLock::new(HashMap::new()),
            field_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener for every invalidated element cache entry
    pub fn on_element_invalidated<F>(&self, callback: F)
    where
        F: Fn(&CacheKey) + Send + Sync + 'static,
    {
        self.element_listeners
            .write_recovered()
            .push(Arc::new(callback));
    }

    /// Register a listener for invalidated entries of one element type
    pub fn watch_element_type<F>(&self, element_type: ElementType, callback: F)
    where
        F: Fn(&CacheKey) + Send + Sync + 'static,
    {
        self.type_listeners
            .write_recovered()
            .entry(element_type)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Register a listener for invalidated field settings
    pub fn on_field_invalidated<F>(&self, callback: F)
    where
        F: Fn(FieldId) + Send + Sync + 'static,
    {
        self.field_listeners.write_recovered().push(Arc::new(callback));
    }

    pub(crate) fn notify_element(&self, key: &CacheKey) {
        // Snapshot so a callback may register further listeners
        let global: Vec<ElementCallback> = self.element_listeners.read_recovered().clone();
        for callback in &global {
            callback(key);
        }

        let typed: Vec<ElementCallback> = self
            .type_listeners
            .read_recovered()
            .get(&key.element_type)
            .cloned()
            .unwrap_or_default();
        for callback in &typed {
            callback(key);
        }
    }

    pub(crate) fn notify_field(&self, field_id: FieldId) {
        let listeners: Vec<FieldCallback> = self.field_listeners.read_recovered().clone();
        for callback in &listeners {
            callback(field_id);
        }
    }

    /// Remove the listeners for one element type
    pub fn unwatch_element_type(&self, element_type: &ElementType) {
        self.type_listeners.write_recovered().remove(element_type);
    }

    /// Clear all listeners
    pub fn clear(&self) {
        self.element_listeners.write_recovered().clear();
        self.type_listeners.write_recovered().clear();
        self.field_listeners.write_recovered().clear();
    }
}

impl Default for InvalidationEvents {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
