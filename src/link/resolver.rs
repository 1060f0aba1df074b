//! Turning link values into renderable links
//!
//! Raw link types resolve from their own target and never touch the cache.
//! Element links read the [`ElementCache`]; a key the render batch did not
//! preload falls back to a single-item lookup that populates the cache.

use crate::element::{CacheKey, ElementCache, ElementCacheEntry, ElementStore};
use crate::link::{LinkTarget, LinkTypeRegistry, LinkValue, RenderableLink};
use log::{debug, warn};

/// Resolves link values against the element cache.
pub struct ElementLinkResolver<'a> {
    registry: &'a LinkTypeRegistry,
    cache: &'a ElementCache,
    store: &'a dyn ElementStore,
}

impl<'a> ElementLinkResolver<'a> {
    pub fn new(
        registry: &'a LinkTypeRegistry,
        cache: &'a ElementCache,
        store: &'a dyn ElementStore,
    ) -> Self {
        Self {
            registry,
            cache,
            store,
        }
    }

    /// Resolve a link. Never fails: anything that cannot be linked renders
    /// as an empty link.
    pub fn resolve(&self, link: &LinkValue) -> RenderableLink {
        let Some(link_type) = self.registry.get(&link.link_type) else {
            warn!("Skipping link with unregistered type '{}'", link.link_type);
            return RenderableLink::empty();
        };
        let Some(target) = &link.target else {
            return RenderableLink::empty();
        };

        let LinkTarget::Element(element_ref) = target else {
            return match link_type.href(target, None) {
                Some(href) => {
                    RenderableLink::from_link(link, href, link_type.default_text(target, None))
                }
                None => RenderableLink::empty(),
            };
        };

        let Some(element_type) = link_type.element_type() else {
            warn!(
                "Link type '{}' does not target elements; skipping element link",
                link.link_type
            );
            return RenderableLink::empty();
        };

        let key = CacheKey::new(element_type.clone(), element_ref.id, element_ref.site_id);
        let entry = match self.cache.get(&key) {
            Some(entry) => entry,
            None => {
                debug!("Element {key} was not preloaded; resolving it individually");
                match self.cache.resolve_single(&key, self.store) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Failed to resolve element {key}: {e}");
                        return RenderableLink::empty();
                    }
                }
            }
        };

        let ElementCacheEntry::Found(element) = entry else {
            return RenderableLink::empty();
        };
        if link_type.check_element_uri() && element.uri.is_none() {
            debug!("Element {key} has no URI; rendering nothing");
            return RenderableLink::empty();
        }

        match link_type.href(target, Some(&element)) {
            Some(href) => RenderableLink::from_link(
                link,
                href,
                link_type.default_text(target, Some(&element)),
            ),
            None => RenderableLink::empty(),
        }
    }
}
