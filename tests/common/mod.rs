//! Common test utilities for linkfield integration tests
//!
//! Provides a shared fixture with an in-memory element store, an in-memory
//! field configuration source and a built manager.

#![allow(dead_code)]

use linkfield::{
    BlockTypeId, CacheStrategy, ElementSummary, ElementType, FieldId, LinkManager,
    MemoryConfigSource, MemoryElementStore,
};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// Field Configurations
// =============================================================================

/// Field allowing several links of every common type.
pub const NAV_FIELD: FieldId = FieldId(1);

/// Single-link field opening links in a new window by default.
pub const CTA_FIELD: FieldId = FieldId(2);

/// Field nested in block type [`BLOCK_TYPE`].
pub const NESTED_FIELD: FieldId = FieldId(3);

pub const BLOCK_TYPE: BlockTypeId = BlockTypeId(30);

pub fn nav_field_config() -> Value {
    json!({
        "uid": "uid-nav",
        "handle": "navigation",
        "settings": {
            "multipleLinks": true,
            "defaultLinkType": "entry",
            "linkTypes": [
                {"handle": "entry", "sources": ["section:pages"]},
                {"handle": "asset"},
                {"handle": "url"},
                {"handle": "email"},
                {"handle": "phone"}
            ]
        }
    })
}

pub fn cta_field_config() -> Value {
    json!({
        "uid": "uid-cta",
        "handle": "cta",
        "settings": {
            "multipleLinks": false,
            "newWindow": true,
            "linkTypes": [{"handle": "url"}, {"handle": "entry"}, {"handle": "email", "enabled": false}]
        }
    })
}

pub fn nested_field_config() -> Value {
    json!({
        "uid": "uid-nested",
        "handle": "blockLink",
        "blockType": {"id": BLOCK_TYPE.0, "uid": "uid-block"},
        "settings": {"linkTypes": [{"handle": "url"}]}
    })
}

/// A published entry on a site.
pub fn entry(id: u64, site: u64) -> ElementSummary {
    ElementSummary::new(ElementType::entry(), id, site)
        .with_title(format!("Entry {id}"))
        .with_uri(format!("entry-{id}"))
        .with_url(format!("https://site{site}.example.com/entry-{id}"))
}

/// An asset: has a URL but no URI.
pub fn asset(id: u64, site: u64) -> ElementSummary {
    ElementSummary::new(ElementType::asset(), id, site)
        .with_title(format!("file-{id}.pdf"))
        .with_url(format!("https://cdn.example.com/file-{id}.pdf"))
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Test fixture with seeded element store, field configs and a manager
pub struct TestFixture {
    pub store: Arc<MemoryElementStore>,
    pub fields: Arc<MemoryConfigSource>,
    pub manager: LinkManager,
}

impl TestFixture {
    /// Create a new test fixture with default configuration
    pub fn new() -> Self {
        Self::with_strategy(CacheStrategy::Full)
    }

    /// Create a fixture whose element cache uses the given strategy
    pub fn with_strategy(strategy: CacheStrategy) -> Self {
        init_logging();

        let store = Arc::new(MemoryElementStore::new());
        for id in [5, 7, 9] {
            store.insert(entry(id, 1));
        }
        store.insert(entry(5, 2));
        store.insert(entry(42, 1));
        store.insert(asset(100, 1));

        let fields = Arc::new(MemoryConfigSource::new());
        fields.set(NAV_FIELD, nav_field_config());
        fields.set(CTA_FIELD, cta_field_config());
        fields.set(NESTED_FIELD, nested_field_config());

        let manager = LinkManager::builder()
            .element_store(store.clone())
            .config_source(fields.clone())
            .cache_strategy(strategy)
            .build()
            .expect("Failed to create manager");

        Self {
            store,
            fields,
            manager,
        }
    }

    /// Forget the queries issued so far
    pub fn reset_queries(&self) {
        self.store.clear_queries();
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Initialise logging once; repeated calls are harmless
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
