//! # linkfield - configurable link fields
//!
//! A link field stores one or more links per element. Each link has a type
//! (URL, email, phone, entry, asset, ...), a typed target and optional
//! decorations such as link text, CSS classes or custom attributes. This
//! crate resolves those stored values into renderable links.
//!
//! ## Features
//!
//! - **Link Types**: an open registry of link variants, with built-ins for
//!   raw values and CMS elements
//! - **Batched Resolution**: element links seen while a page renders are
//!   looked up with one query per `(element type, site)` pair
//! - **Element Cache**: resolved elements are kept until the element is saved
//!   or deleted; deleted elements are remembered as missing
//! - **Field Cache**: parsed field settings are kept until the field or its
//!   block type changes
//! - **Project Config**: link field settings are canonicalised before they
//!   are written to project config
//!
//! ## Quick Start
//!
//! ```rust
//! use linkfield::{
//!     ElementSummary, ElementType, FieldId, LinkManager, LinkValue, MemoryConfigSource,
//!     MemoryElementStore, RequestKind,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryElementStore::new());
//! store.insert(
//!     ElementSummary::new(ElementType::entry(), 5, 1)
//!         .with_title("News")
//!         .with_uri("news")
//!         .with_url("https://example.com/news"),
//! );
//!
//! let fields = Arc::new(MemoryConfigSource::new());
//! fields.set(FieldId(1), json!({
//!     "uid": "8c1f", "handle": "cta",
//!     "settings": {"multipleLinks": true, "linkTypes": [{"handle": "entry"}, {"handle": "url"}]}
//! }));
//!
//! let manager = LinkManager::builder()
//!     .element_store(store)
//!     .config_source(fields)
//!     .build()?;
//!
//! let value = manager.decode_value(r#"[
//!     {"type": "entry", "target": {"kind": "element", "id": 5, "siteId": 1}},
//!     {"type": "url", "target": {"kind": "url", "url": "https://rust-lang.org"}, "linkText": "Rust"}
//! ]"#)?;
//!
//! // One batch per page render
//! let mut batch = manager.begin_render(RequestKind::Site, true);
//! manager.record_links(&mut batch, &value);
//! manager.preload_cache(&mut batch);
//!
//! let html: Vec<String> = manager
//!     .render_field(FieldId(1), &value)?
//!     .iter()
//!     .map(|link| link.to_html())
//!     .collect();
//! assert_eq!(html[0], r#"<a href="https://example.com/news">News</a>"#);
//! assert_eq!(html[1], r#"<a href="https://rust-lang.org">Rust</a>"#);
//! # Ok::<(), linkfield::Error>(())
//! ```
//!
//! ## Invalidation
//!
//! Feed authoring-side events to [`LinkManager::handle_event`]:
//!
//! ```rust,ignore
//! manager.handle_event(&LifecycleEvent::ElementSaved {
//!     element_type: ElementType::entry(),
//!     element_id: ElementId(5),
//!     site_ids: vec![SiteId(1), SiteId(2)],
//! });
//! ```
//!
//! Resolution never fails: a link to a deleted element renders as an empty
//! link. Configuration problems (unknown link types, malformed field
//! settings) are returned as [`Error`].

// Core modules
mod batch;
pub mod cache;
mod error;
mod events;
mod manager;
pub mod storage;
mod sync;

// Grouped modules
pub mod config;
pub mod element;
pub mod field;
pub mod link;

// Re-exports from core
pub use batch::{PreloadReport, RenderBatch, RequestKind};
pub use cache::CacheStrategy;
pub use config::{LinkConfig, LinkConfigBuilder};
pub use element::{
    CacheKey, ElementCache, ElementCacheEntry, ElementId, ElementStore, ElementSummary,
    ElementType, MemoryElementStore, ResolvedElement, SiteId,
};
pub use error::{Error, Result};
pub use events::{InvalidationEvents, LifecycleEvent};
pub use field::{
    BlockTypeId, ConfigAction, ConfigEvent, ConfigPath, FieldCache, FieldConfigSource, FieldId,
    FieldSettings, LinkTypeSettings, MemoryConfigSource,
};
pub use link::{
    ElementLinkResolver, ElementLinkType, LinkType, LinkTypeRegistry, LinkValue, RawKind,
    RawLinkType, RenderableLink,
};
pub use manager::{LinkManager, LinkManagerBuilder};
pub use storage::{JsonStorage, StorageBackend};
