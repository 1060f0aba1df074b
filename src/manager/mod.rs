//! Main link manager module
//!
//! This module contains the [`LinkManager`] struct which is the primary entry
//! point for rendering link fields.

mod builder;

pub use builder::LinkManagerBuilder;

use crate::batch::{PreloadReport, RenderBatch, RequestKind};
use crate::config::{LinkConfig, rebuild_fields};
use crate::element::{CacheKey, ElementCache, ElementStore, ElementSummary};
use crate::error::Result;
use crate::events::{InvalidationEvents, LifecycleEvent};
use crate::field::{BlockTypeId, FieldCache, FieldConfigSource, FieldId, FieldSettings};
use crate::link::{ElementLinkResolver, LinkTypeRegistry, LinkValue, RenderableLink};
use crate::storage::StorageBackend;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

/// Link field manager: resolves stored link values into renderable links.
///
/// The `LinkManager` owns the process-scoped state:
///
/// - **Link types**: the registry of link variants
/// - **Element cache**: resolved elements, invalidated on save and delete
/// - **Field cache**: parsed field settings, invalidated on config changes
/// - **Listeners**: callbacks run after cache invalidation
///
/// Per-request state lives in a [`RenderBatch`] obtained from
/// [`begin_render`](Self::begin_render).
///
/// # Example
///
/// ```rust
/// use linkfield::{
///     ElementSummary, ElementType, LinkManager, LinkValue, MemoryConfigSource,
///     MemoryElementStore, RequestKind,
/// };
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryElementStore::new());
/// store.insert(
///     ElementSummary::new(ElementType::entry(), 5, 1)
///         .with_title("About")
///         .with_uri("about")
///         .with_url("https://example.com/about"),
/// );
///
/// let manager = LinkManager::builder()
///     .element_store(store)
///     .config_source(Arc::new(MemoryConfigSource::new()))
///     .build()
///     .unwrap();
///
/// let links = vec![LinkValue::element("entry", 5, 1)];
/// let mut batch = manager.begin_render(RequestKind::Site, true);
/// manager.record_links(&mut batch, &links);
/// manager.preload_cache(&mut batch);
///
/// assert_eq!(
///     manager.resolve(&links[0]).to_html(),
///     r#"<a href="https://example.com/about">About</a>"#
/// );
/// ```
pub struct LinkManager {
    config: LinkConfig,
    registry: LinkTypeRegistry,
    store: Arc<dyn ElementStore>,
    config_source: Arc<dyn FieldConfigSource>,
    elements: ElementCache,
    fields: FieldCache,
    events: Arc<InvalidationEvents>,
}

impl LinkManager {
    /// Create a new builder for LinkManager
    pub fn builder() -> LinkManagerBuilder {
        LinkManagerBuilder::new()
    }

    pub(crate) fn new(
        config: LinkConfig,
        registry: LinkTypeRegistry,
        store: Arc<dyn ElementStore>,
        config_source: Arc<dyn FieldConfigSource>,
    ) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(InvalidationEvents::new());
        let elements = ElementCache::new(config.cache_strategy, Arc::clone(&events))?;
        let fields = FieldCache::new(Arc::clone(&events));

        info!(
            "Link manager ready: {} link types, cache strategy {:?}, preload {}",
            registry.len(),
            config.cache_strategy,
            if config.preload_enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            registry,
            store,
            config_source,
            elements,
            fields,
            events,
        })
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Start collecting element links for one request.
    ///
    /// Only successful site requests with preloading enabled get a live
    /// batch; everything else resolves link by link.
    pub fn begin_render(&self, kind: RequestKind, response_ok: bool) -> RenderBatch {
        if !self.config.preload_enabled {
            return RenderBatch::inert();
        }
        RenderBatch::for_request(kind, response_ok).starting_at(self.elements.generation())
    }

    /// Record an element the page loaded, so links to it need no query.
    pub fn record_element_populated(&self, batch: &mut RenderBatch, element: &ElementSummary) {
        batch.record_element_populated(element);
    }

    /// Record the element links of a field value. Returns how many were
    /// recorded.
    pub fn record_links(&self, batch: &mut RenderBatch, links: &[LinkValue]) -> usize {
        if !batch.is_active() {
            return 0;
        }
        let mut recorded = 0;
        for link in links {
            let Some(element_ref) = link.element_ref() else {
                continue;
            };
            let Some(element_type) = self
                .registry
                .get(&link.link_type)
                .and_then(|link_type| link_type.element_type())
            else {
                debug!(
                    "Not preloading link of type '{}': not an element link type",
                    link.link_type
                );
                continue;
            };
            batch.record_pending_link(element_type.clone(), element_ref.id, element_ref.site_id);
            recorded += 1;
        }
        recorded
    }

    /// Resolve everything the batch collected. Call once, right before the
    /// response body is produced.
    pub fn preload_cache(&self, batch: &mut RenderBatch) -> PreloadReport {
        self.elements.preload_cache(batch, self.store.as_ref())
    }

    /// A resolver borrowing this manager's registry, cache and store.
    pub fn resolver(&self) -> ElementLinkResolver<'_> {
        ElementLinkResolver::new(&self.registry, &self.elements, self.store.as_ref())
    }

    /// Resolve one link. Never fails.
    pub fn resolve(&self, link: &LinkValue) -> RenderableLink {
        self.resolver().resolve(link)
    }

    /// Render a field value under the field's settings.
    ///
    /// Links of types the field does not enable are dropped. Links that do
    /// not choose a window behaviour get the field default. Without
    /// `multiple_links` only the first link is kept.
    ///
    /// # Errors
    ///
    /// Returns the error of [`field_settings`](Self::field_settings); link
    /// resolution itself never fails.
    pub fn render_field(&self, field_id: FieldId, links: &[LinkValue]) -> Result<Vec<RenderableLink>> {
        let settings = self.field_settings(field_id)?;
        let limit = if settings.multiple_links { usize::MAX } else { 1 };
        let resolver = self.resolver();

        let rendered = links
            .iter()
            .filter(|link| {
                let allowed = settings.allows(&link.link_type);
                if !allowed {
                    warn!(
                        "Field '{}' does not allow link type '{}'; skipping",
                        settings.handle, link.link_type
                    );
                }
                allowed
            })
            .take(limit)
            .map(|link| {
                if link.decorations.new_window.is_none() && settings.new_window_default {
                    resolver.resolve(&link.clone().with_new_window(true))
                } else {
                    resolver.resolve(link)
                }
            })
            .collect();
        Ok(rendered)
    }

    // =========================================================================
    // Field configuration
    // =========================================================================

    /// Parsed settings of a field, served from the field cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldNotFound`](crate::Error::FieldNotFound),
    /// [`Error::InvalidFieldConfig`](crate::Error::InvalidFieldConfig) or the
    /// configuration source's error.
    pub fn field_settings(&self, field_id: FieldId) -> Result<Arc<FieldSettings>> {
        self.fields
            .get_field_settings(field_id, self.config_source.as_ref(), &self.registry)
    }

    /// Record that a field lives inside a block type.
    pub fn register_block_type(&self, block_type_id: BlockTypeId, field_id: FieldId) {
        self.fields.register_block_type(block_type_id, field_id);
    }

    /// Canonicalise the link fields of a project config before it is written.
    ///
    /// # Errors
    ///
    /// See [`rebuild_fields`].
    pub fn rebuild_project_config(&self, project: &mut Value) -> Result<usize> {
        rebuild_fields(project, &self.registry, &self.config.field_type)
    }

    // =========================================================================
    // Stored values
    // =========================================================================

    /// Decode and validate a stored field value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLinkValue`](crate::Error::InvalidLinkValue) for
    /// unreadable content and the validation errors of
    /// [`LinkValue::validate`].
    pub fn decode_value(&self, content: &str) -> Result<Vec<LinkValue>> {
        let links = self.config.storage.decode_links(content)?;
        for link in &links {
            link.validate(&self.registry)?;
        }
        Ok(links)
    }

    /// Encode a field value for storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`](crate::Error::Serialize) if serialization
    /// fails.
    pub fn encode_value(&self, links: &[LinkValue]) -> Result<String> {
        self.config.storage.encode_links(links)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Route an authoring-side event to the caches. Returns the number of
    /// cache entries dropped.
    pub fn handle_event(&self, event: &LifecycleEvent) -> usize {
        let dropped = match event {
            LifecycleEvent::ElementSaved {
                element_type,
                element_id,
                site_ids,
            } => self
                .elements
                .on_save_element(element_type, *element_id, site_ids),
            LifecycleEvent::ElementDeleted {
                element_type,
                element_id,
                site_ids,
            } => self
                .elements
                .on_delete_element(element_type, *element_id, site_ids),
            LifecycleEvent::FieldSaved(field_id) => usize::from(self.fields.on_save_field(*field_id)),
            LifecycleEvent::FieldDeleted(field_id) => {
                usize::from(self.fields.on_delete_field(*field_id))
            }
            LifecycleEvent::BlockTypeSaved(block_type_id) => {
                self.fields.on_save_block_type(*block_type_id)
            }
            LifecycleEvent::BlockTypeDeleted(block_type_id) => {
                self.fields.on_delete_block_type(*block_type_id)
            }
            LifecycleEvent::Config(config_event) => self.fields.on_config_event(config_event),
        };
        debug!("{event:?} dropped {dropped} cache entries");
        dropped
    }

    /// Drop one element cache entry.
    pub fn invalidate_element(&self, key: &CacheKey) -> bool {
        self.elements.invalidate(key)
    }

    /// Drop every cached element and field.
    pub fn clear_caches(&self) {
        self.elements.clear();
        self.fields.clear();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn registry(&self) -> &LinkTypeRegistry {
        &self.registry
    }

    pub fn element_cache(&self) -> &ElementCache {
        &self.elements
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.fields
    }

    /// Invalidation listeners
    pub fn events(&self) -> &Arc<InvalidationEvents> {
        &self.events
    }

    pub fn element_store(&self) -> &Arc<dyn ElementStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, ElementType, MemoryElementStore, SiteId};
    use crate::field::MemoryConfigSource;
    use serde_json::json;

    fn manager() -> (LinkManager, Arc<MemoryElementStore>, Arc<MemoryConfigSource>) {
        let store = Arc::new(MemoryElementStore::new());
        store.insert(
            ElementSummary::new(ElementType::entry(), 5, 1)
                .with_title("About")
                .with_uri("about")
                .with_url("https://example.com/about"),
        );
        let source = Arc::new(MemoryConfigSource::new());
        source.set(
            FieldId(1),
            json!({"uid": "f1", "handle": "cta", "settings": {
                "newWindow": true,
                "linkTypes": [{"handle": "entry"}, {"handle": "url"}]
            }}),
        );
        let manager = LinkManager::builder()
            .element_store(store.clone())
            .config_source(source.clone())
            .build()
            .unwrap();
        (manager, store, source)
    }

    #[test]
    fn test_record_links_skips_raw_links() {
        let (manager, _, _) = manager();
        let mut batch = manager.begin_render(RequestKind::Site, true);
        let recorded = manager.record_links(
            &mut batch,
            &[
                LinkValue::element("entry", 5, 1),
                LinkValue::url("url", "https://example.com"),
                LinkValue::element("unknown", 5, 1),
            ],
        );
        assert_eq!(recorded, 1);
        assert_eq!(batch.pending_len(), 1);
    }

    #[test]
    fn test_preload_disabled_gives_inert_batch() {
        let store = Arc::new(MemoryElementStore::new());
        let manager = LinkManager::builder()
            .element_store(store)
            .config_source(Arc::new(MemoryConfigSource::new()))
            .preload(false)
            .build()
            .unwrap();
        assert!(!manager.begin_render(RequestKind::Site, true).is_active());
    }

    #[test]
    fn test_render_field_applies_settings() {
        let (manager, _, _) = manager();
        let links = vec![
            LinkValue::element("entry", 5, 1),
            LinkValue::email("email", "a@example.com"),
            LinkValue::url("url", "https://example.com").with_new_window(false),
        ];

        let rendered = manager.render_field(FieldId(1), &links).unwrap();

        // email is not enabled; multiple links are off
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].href.as_deref(), Some("https://example.com/about"));
        assert!(rendered[0].new_window);
    }

    #[test]
    fn test_render_unknown_field_fails() {
        let (manager, _, _) = manager();
        assert!(manager.render_field(FieldId(77), &[]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_handle_element_events() {
        let (manager, store, _) = manager();
        let link = LinkValue::element("entry", 5, 1);
        assert!(!manager.resolve(&link).is_empty());

        let saved = LifecycleEvent::ElementSaved {
            element_type: ElementType::entry(),
            element_id: ElementId(5),
            site_ids: vec![SiteId(1)],
        };
        assert_eq!(manager.handle_event(&saved), 1);

        store.remove_everywhere(&ElementType::entry(), ElementId(5));
        let deleted = LifecycleEvent::ElementDeleted {
            element_type: ElementType::entry(),
            element_id: ElementId(5),
            site_ids: vec![SiteId(1)],
        };
        manager.handle_event(&deleted);
        store.clear_queries();

        assert!(manager.resolve(&link).is_empty());
        assert_eq!(store.query_count(), 0);
    }

    #[test]
    fn test_handle_field_events() {
        let (manager, _, source) = manager();
        manager.field_settings(FieldId(1)).unwrap();
        assert_eq!(manager.handle_event(&LifecycleEvent::FieldSaved(FieldId(1))), 1);
        manager.field_settings(FieldId(1)).unwrap();
        assert_eq!(source.load_count(), 2);
    }

    #[test]
    fn test_value_encoding() {
        let (manager, _, _) = manager();
        let links = vec![LinkValue::element("entry", 5, 1).with_text("About us")];
        let encoded = manager.encode_value(&links).unwrap();
        assert_eq!(manager.decode_value(&encoded).unwrap(), links);

        let wrong_kind = r#"[{"type":"entry","target":{"kind":"url","url":"https://x"}}]"#;
        assert!(manager.decode_value(wrong_kind).unwrap_err().is_configuration_error());
    }
}
