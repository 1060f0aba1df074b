//! Elements, the element store boundary and the element cache
//!
//! - [`ElementType`], [`ElementId`], [`SiteId`] - identity of a content unit
//! - [`CacheKey`] - `(element type, element id, site id)`, the unit of caching
//! - [`ElementStore`] - the external bulk lookup the cache resolves against
//! - [`ElementCache`] - the process-scoped, invalidation-aware store of lookups

mod cache;
mod memory;

pub use cache::{ElementCache, ElementCacheEntry, ResolvedElement};
pub use memory::{MemoryElementStore, StoreQuery};

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Kind of element a link can target (`entry`, `asset`, `category`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementType(String);

impl ElementType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn entry() -> Self {
        Self::new("entry")
    }

    pub fn asset() -> Self {
        Self::new("asset")
    }

    pub fn category() -> Self {
        Self::new("category")
    }

    pub fn user() -> Self {
        Self::new("user")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element identifier.
///
/// Stored link values written by older field versions kept the id as a
/// numeric string or as a one-element list; both are accepted on input.
/// Anything else that is not exactly one id is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
            List(Vec<Repr>),
        }

        fn flatten<E: serde::de::Error>(repr: Repr) -> std::result::Result<u64, E> {
            match repr {
                Repr::Number(id) => Ok(id),
                Repr::Text(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid element id '{text}'"))),
                Repr::List(mut items) if items.len() == 1 => match items.remove(0) {
                    Repr::List(_) => Err(E::custom("nested element id list")),
                    single => flatten(single),
                },
                Repr::List(items) => Err(E::custom(format!(
                    "expected exactly one element id, got {}",
                    items.len()
                ))),
            }
        }

        flatten(Repr::deserialize(deserializer)?).map(ElementId)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Site (localization scope) identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite identity of one cached element resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub element_type: ElementType,
    pub element_id: ElementId,
    pub site_id: SiteId,
}

impl CacheKey {
    pub fn new(element_type: ElementType, element_id: ElementId, site_id: SiteId) -> Self {
        Self {
            element_type,
            element_id,
            site_id,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.element_type, self.element_id, self.site_id)
    }
}

/// What the element store knows about one element on one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub element_type: ElementType,
    pub id: ElementId,
    pub site_id: SiteId,
    #[serde(default)]
    pub title: Option<String>,
    /// Site-relative URI; elements without one (assets, users) have no page.
    #[serde(default)]
    pub uri: Option<String>,
    /// Absolute URL the element is reachable at.
    #[serde(default)]
    pub url: Option<String>,
}

impl ElementSummary {
    pub fn new(element_type: ElementType, id: u64, site_id: u64) -> Self {
        Self {
            element_type,
            id: ElementId(id),
            site_id: SiteId(site_id),
            title: None,
            uri: None,
            url: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.element_type.clone(), self.id, self.site_id)
    }
}

/// Bulk element lookup provided by the host.
///
/// Implementations only return elements that exist and are live on the
/// requested site; ids they leave out are treated as missing.
pub trait ElementStore: Send + Sync {
    /// Look up every id of one element type on one site in a single query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ElementStore`](crate::Error::ElementStore) when the
    /// underlying query fails.
    fn find_elements(
        &self,
        element_type: &ElementType,
        ids: &[ElementId],
        site_id: SiteId,
    ) -> Result<Vec<ElementSummary>>;

    /// URI used to decide whether an element has a page to link to.
    fn element_uri(&self, element: &ElementSummary) -> Option<String> {
        element.uri.clone()
    }

    /// URL a link to this element points at.
    fn element_url(&self, element: &ElementSummary) -> Option<String> {
        element.url.clone()
    }
}
