//! Registry of known link types

use crate::link::kind::{ElementLinkType, LinkType, RawLinkType};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Link types available to fields, keyed by handle.
#[derive(Clone, Default)]
pub struct LinkTypeRegistry {
    types: HashMap<String, Arc<dyn LinkType>>,
}

impl LinkTypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in raw and element link types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RawLinkType::url());
        registry.register(RawLinkType::email());
        registry.register(RawLinkType::phone());
        registry.register(RawLinkType::custom());
        registry.register(ElementLinkType::entry());
        registry.register(ElementLinkType::category());
        registry.register(ElementLinkType::asset());
        registry.register(ElementLinkType::user());
        registry.register(ElementLinkType::product());
        registry
    }

    /// Register a link type, replacing any previous type with the same handle.
    pub fn register<T: LinkType + 'static>(&mut self, link_type: T) {
        self.register_arc(Arc::new(link_type));
    }

    pub fn register_arc(&mut self, link_type: Arc<dyn LinkType>) {
        let handle = link_type.handle().to_string();
        if self.types.insert(handle.clone(), link_type).is_some() {
            debug!("Replaced link type registration for '{handle}'");
        }
    }

    pub fn get(&self, handle: &str) -> Option<&Arc<dyn LinkType>> {
        self.types.get(handle)
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.types.contains_key(handle)
    }

    /// Registered handles, sorted.
    pub fn handles(&self) -> Vec<&str> {
        let mut handles: Vec<&str> = self.types.keys().map(String::as_str).collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for LinkTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkTypeRegistry")
            .field("handles", &self.handles())
            .finish()
    }
}
