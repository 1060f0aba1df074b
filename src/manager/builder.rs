//! Builder for LinkManager
//!
//! This module contains [`LinkManagerBuilder`] which provides a fluent API
//! for creating a [`LinkManager`](super::LinkManager).

use crate::cache::CacheStrategy;
use crate::config::{LinkConfig, LinkConfigBuilder};
use crate::element::ElementStore;
use crate::error::{Error, Result};
use crate::field::FieldConfigSource;
use crate::link::{LinkType, LinkTypeRegistry};
use std::sync::Arc;

use super::LinkManager;

/// Builder for creating a [`LinkManager`] with a fluent API.
///
/// The element store and the field configuration source are required; the
/// registry starts with the built-in link types.
///
/// # Example
///
/// ```rust
/// use linkfield::{
///     CacheStrategy, ElementLinkType, ElementType, LinkManager, MemoryConfigSource,
///     MemoryElementStore,
/// };
/// use std::sync::Arc;
///
/// let manager = LinkManager::builder()
///     .element_store(Arc::new(MemoryElementStore::new()))
///     .config_source(Arc::new(MemoryConfigSource::new()))
///     .cache_strategy(CacheStrategy::Lru(10_000))
///     .with_link_type(ElementLinkType::new("event", "Event", ElementType::new("event")))
///     .build()
///     .unwrap();
///
/// assert!(manager.registry().contains("event"));
/// ```
pub struct LinkManagerBuilder {
    config_builder: LinkConfigBuilder,
    config: Option<LinkConfig>,
    registry: LinkTypeRegistry,
    store: Option<Arc<dyn ElementStore>>,
    config_source: Option<Arc<dyn FieldConfigSource>>,
}

impl Default for LinkManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkManagerBuilder {
    /// Create a new builder with the built-in link types registered.
    pub fn new() -> Self {
        Self {
            config_builder: LinkConfigBuilder::new(),
            config: None,
            registry: LinkTypeRegistry::with_defaults(),
            store: None,
            config_source: None,
        }
    }

    /// Set where element links are looked up.
    #[must_use]
    pub fn element_store(mut self, store: Arc<dyn ElementStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set where field configuration is loaded from.
    #[must_use]
    pub fn config_source(mut self, source: Arc<dyn FieldConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Set the element cache strategy (default: [`CacheStrategy::Full`]).
    #[must_use]
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.config_builder = self.config_builder.cache_strategy(strategy);
        self
    }

    /// Turn per-render batching on or off (default: on).
    #[must_use]
    pub fn preload(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.preload(enabled);
        self
    }

    /// Set the field-type identifier used in project config.
    #[must_use]
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.field_type(field_type);
        self
    }

    /// Pretty-print stored field values.
    #[must_use]
    pub fn pretty_json(mut self) -> Self {
        self.config_builder = self.config_builder.pretty_json();
        self
    }

    /// Use a complete configuration, replacing the individual options above.
    #[must_use]
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register an additional link type, replacing a built-in one with the
    /// same handle.
    #[must_use]
    pub fn with_link_type<T: LinkType + 'static>(mut self, link_type: T) -> Self {
        self.registry.register(link_type);
        self
    }

    /// Start from a registry of your own instead of the built-ins.
    #[must_use]
    pub fn with_registry(mut self, registry: LinkTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build the LinkManager.
    ///
    /// # Errors
    ///
    /// Returns an error if the element store or configuration source is
    /// missing, or the cache strategy is invalid.
    pub fn build(self) -> Result<LinkManager> {
        let store = self
            .store
            .ok_or_else(|| Error::Config("no element store was provided".into()))?;
        let config_source = self
            .config_source
            .ok_or_else(|| Error::Config("no field configuration source was provided".into()))?;
        let config = self
            .config
            .unwrap_or_else(|| self.config_builder.build());

        LinkManager::new(config, self.registry, store, config_source)
    }
}
