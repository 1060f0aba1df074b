//! Core configuration types for linkfield

use crate::cache::CacheStrategy;
use crate::storage::JsonStorage;

/// Field-type identifier link fields carry in project config
pub const DEFAULT_FIELD_TYPE: &str = "linkfield.LinkField";

/// Configuration for initializing the LinkManager
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How resolved elements are cached between renders
    pub cache_strategy: CacheStrategy,

    /// Batch element lookups per render; when off every link resolves alone
    pub preload_enabled: bool,

    /// Field-type identifier used to find link fields in project config
    pub field_type: String,

    /// Encoding of stored field values
    pub storage: JsonStorage,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            cache_strategy: CacheStrategy::default(),
            preload_enabled: true,
            field_type: DEFAULT_FIELD_TYPE.into(),
            storage: JsonStorage::compact(),
        }
    }
}

impl LinkConfig {
    /// Create a new builder for LinkConfig
    ///
    /// # Example
    /// ```rust
    /// use linkfield::{CacheStrategy, LinkConfig};
    ///
    /// let config = LinkConfig::builder()
    ///     .cache_strategy(CacheStrategy::Lru(1024))
    ///     .build();
    /// ```
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::new()
    }

    /// Check the configuration before a manager is built from it
    ///
    /// # Errors
    ///
    /// Returns error if the cache strategy is invalid
    pub fn validate(&self) -> crate::Result<()> {
        self.cache_strategy.validate()
    }
}

/// Builder for creating LinkConfig with a fluent API
#[derive(Debug, Clone)]
pub struct LinkConfigBuilder {
    cache_strategy: CacheStrategy,
    preload_enabled: bool,
    field_type: String,
    pretty_json: bool,
}

impl Default for LinkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfigBuilder {
    pub fn new() -> Self {
        Self {
            cache_strategy: CacheStrategy::default(),
            preload_enabled: true,
            field_type: DEFAULT_FIELD_TYPE.into(),
            pretty_json: false,
        }
    }

    /// Set the element cache strategy (default: [`CacheStrategy::Full`])
    #[must_use]
    pub fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = strategy;
        self
    }

    /// Turn per-render batching on or off (default: on)
    #[must_use]
    pub fn preload(mut self, enabled: bool) -> Self {
        self.preload_enabled = enabled;
        self
    }

    /// Set the field-type identifier (default: "linkfield.LinkField")
    #[must_use]
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    /// Pretty-print stored field values
    #[must_use]
    pub fn pretty_json(mut self) -> Self {
        self.pretty_json = true;
        self
    }

    /// Build the LinkConfig
    pub fn build(self) -> LinkConfig {
        let storage = if self.pretty_json {
            JsonStorage::new()
        } else {
            JsonStorage::compact()
        };

        LinkConfig {
            cache_strategy: self.cache_strategy,
            preload_enabled: self.preload_enabled,
            field_type: self.field_type,
            storage,
        }
    }
}
