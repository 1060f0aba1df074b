//! Link type definitions
//!
//! Every link variant implements [`LinkType`]. The built-in raw types cover
//! URLs, email addresses, phone numbers and free-form values; element links
//! are all served by [`ElementLinkType`], parameterised by the element type
//! they point at.

use crate::element::{ElementType, ResolvedElement};
use crate::error::{Error, Result};
use crate::field::LinkTypeSettings;
use crate::link::{LinkTarget, TargetKind};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

static PHONE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s().\-]+").expect("phone separator pattern is valid"));

/// Capability set of a link variant.
pub trait LinkType: Send + Sync + fmt::Debug {
    /// Stable handle stored in link values (`"url"`, `"entry"`, ...).
    fn handle(&self) -> &str;

    /// Human readable name shown to authors.
    fn display_name(&self) -> &str;

    /// Shape of the target this type stores.
    fn target_kind(&self) -> TargetKind;

    /// Element type targeted by element links.
    fn element_type(&self) -> Option<&ElementType> {
        None
    }

    fn is_element_link(&self) -> bool {
        self.element_type().is_some()
    }

    /// Whether an element without a URI should be treated as unlinkable.
    fn check_element_uri(&self) -> bool {
        false
    }

    /// Link destination, before the URL suffix is applied.
    fn href(&self, target: &LinkTarget, element: Option<&ResolvedElement>) -> Option<String>;

    /// Text used when the author did not set any.
    fn default_text(&self, target: &LinkTarget, element: Option<&ResolvedElement>) -> Option<String> {
        match element {
            Some(element) => element.title.clone(),
            None => target.raw_value().map(str::to_string),
        }
    }

    /// Serialized form of this type's settings inside field configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`] if the settings cannot be serialized.
    fn settings_config(&self, settings: &LinkTypeSettings) -> Result<Value> {
        serde_json::to_value(settings).map_err(Error::from)
    }
}

/// Target kinds a raw link type can store. Element links are defined with
/// [`ElementLinkType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Url,
    Email,
    Phone,
    Custom,
}

impl From<RawKind> for TargetKind {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Url => TargetKind::Url,
            RawKind::Email => TargetKind::Email,
            RawKind::Phone => TargetKind::Phone,
            RawKind::Custom => TargetKind::Custom,
        }
    }
}

/// Link type whose value is raw data (URL, email, phone or custom).
#[derive(Debug, Clone)]
pub struct RawLinkType {
    handle: String,
    display_name: String,
    kind: RawKind,
}

impl RawLinkType {
    pub fn new(handle: impl Into<String>, display_name: impl Into<String>, kind: RawKind) -> Self {
        Self {
            handle: handle.into(),
            display_name: display_name.into(),
            kind,
        }
    }

    pub fn url() -> Self {
        Self::new("url", "URL", RawKind::Url)
    }

    pub fn email() -> Self {
        Self::new("email", "Email", RawKind::Email)
    }

    pub fn phone() -> Self {
        Self::new("phone", "Phone", RawKind::Phone)
    }

    pub fn custom() -> Self {
        Self::new("custom", "Custom", RawKind::Custom)
    }
}

impl LinkType for RawLinkType {
    fn handle(&self) -> &str {
        &self.handle
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn target_kind(&self) -> TargetKind {
        self.kind.into()
    }

    fn href(&self, target: &LinkTarget, _element: Option<&ResolvedElement>) -> Option<String> {
        let href = match target {
            LinkTarget::Url { url } => url.trim().to_string(),
            LinkTarget::Email { email } => format!("mailto:{}", email.trim()),
            LinkTarget::Phone { phone } => {
                format!("tel:{}", PHONE_SEPARATORS.replace_all(phone.trim(), ""))
            }
            LinkTarget::Custom { value } => value.trim().to_string(),
            LinkTarget::Element(_) => return None,
        };

        // "mailto:" / "tel:" alone is not a link
        let empty = target.raw_value().is_none_or(|raw| raw.trim().is_empty());
        (!empty).then_some(href)
    }
}

/// Link to an element of one element type.
#[derive(Debug, Clone)]
pub struct ElementLinkType {
    handle: String,
    display_name: String,
    element_type: ElementType,
    check_element_uri: bool,
}

impl ElementLinkType {
    pub fn new(
        handle: impl Into<String>,
        display_name: impl Into<String>,
        element_type: ElementType,
    ) -> Self {
        Self {
            handle: handle.into(),
            display_name: display_name.into(),
            element_type,
            check_element_uri: true,
        }
    }

    /// Set whether elements without a URI are unlinkable (default: true).
    #[must_use]
    pub fn check_element_uri(mut self, check: bool) -> Self {
        self.check_element_uri = check;
        self
    }

    pub fn entry() -> Self {
        Self::new("entry", "Entry", ElementType::entry())
    }

    pub fn category() -> Self {
        Self::new("category", "Category", ElementType::category())
    }

    /// Assets have URLs but never URIs.
    pub fn asset() -> Self {
        Self::new("asset", "Asset", ElementType::asset()).check_element_uri(false)
    }

    pub fn user() -> Self {
        Self::new("user", "User", ElementType::user()).check_element_uri(false)
    }

    pub fn product() -> Self {
        Self::new("product", "Product", ElementType::new("product"))
    }
}

impl LinkType for ElementLinkType {
    fn handle(&self) -> &str {
        &self.handle
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::Element
    }

    fn element_type(&self) -> Option<&ElementType> {
        Some(&self.element_type)
    }

    fn check_element_uri(&self) -> bool {
        self.check_element_uri
    }

    fn href(&self, _target: &LinkTarget, element: Option<&ResolvedElement>) -> Option<String> {
        element.and_then(|element| element.url.clone())
    }
}
