//! Stored link values
//!
//! A [`LinkValue`] is one configured link of a field value: a link type
//! handle, the typed target it points at and the shared decorations every
//! link type supports. The serialized form is the one persisted with the
//! field value, so it must survive a save/load cycle unchanged.

use crate::element::{ElementId, SiteId};
use crate::error::{Error, Result};
use crate::link::{ElementLinkResolver, LinkTypeRegistry, RenderableLink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The shape of target a link type stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Url,
    Email,
    Phone,
    Element,
    Custom,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Url => "url",
            TargetKind::Email => "email",
            TargetKind::Phone => "phone",
            TargetKind::Element => "element",
            TargetKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Reference to exactly one element on one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRef {
    pub id: ElementId,
    pub site_id: SiteId,
}

/// Typed link target, one variant per [`TargetKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LinkTarget {
    Url { url: String },
    Email { email: String },
    Phone { phone: String },
    Element(ElementRef),
    Custom { value: String },
}

impl LinkTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            LinkTarget::Url { .. } => TargetKind::Url,
            LinkTarget::Email { .. } => TargetKind::Email,
            LinkTarget::Phone { .. } => TargetKind::Phone,
            LinkTarget::Element(_) => TargetKind::Element,
            LinkTarget::Custom { .. } => TargetKind::Custom,
        }
    }

    /// Raw value of non-element targets.
    pub fn raw_value(&self) -> Option<&str> {
        match self {
            LinkTarget::Url { url } => Some(url),
            LinkTarget::Email { email } => Some(email),
            LinkTarget::Phone { phone } => Some(phone),
            LinkTarget::Custom { value } => Some(value),
            LinkTarget::Element(_) => None,
        }
    }
}

/// A single `name="value"` attribute added to the rendered anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAttribute {
    pub attribute: String,
    #[serde(default)]
    pub value: String,
}

/// Presentation attributes shared by every link type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDecorations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_attributes: Vec<CustomAttribute>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_suffix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_title: Option<String>,

    /// Open in a new window; unset means "use the field's default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_window: Option<bool>,
}

/// One configured link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkValue {
    /// Handle of the registered link type.
    #[serde(rename = "type")]
    pub link_type: String,

    /// `None` when the author picked a type but left the value empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LinkTarget>,

    #[serde(flatten)]
    pub decorations: LinkDecorations,
}

impl LinkValue {
    fn with_target(link_type: impl Into<String>, target: Option<LinkTarget>) -> Self {
        Self {
            link_type: link_type.into(),
            target,
            decorations: LinkDecorations::default(),
        }
    }

    /// A link of the given type with no value yet.
    pub fn empty(link_type: impl Into<String>) -> Self {
        Self::with_target(link_type, None)
    }

    pub fn url(link_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_target(link_type, Some(LinkTarget::Url { url: url.into() }))
    }

    pub fn email(link_type: impl Into<String>, email: impl Into<String>) -> Self {
        Self::with_target(
            link_type,
            Some(LinkTarget::Email {
                email: email.into(),
            }),
        )
    }

    pub fn phone(link_type: impl Into<String>, phone: impl Into<String>) -> Self {
        Self::with_target(
            link_type,
            Some(LinkTarget::Phone {
                phone: phone.into(),
            }),
        )
    }

    pub fn custom(link_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_target(
            link_type,
            Some(LinkTarget::Custom {
                value: value.into(),
            }),
        )
    }

    pub fn element(link_type: impl Into<String>, element_id: u64, site_id: u64) -> Self {
        Self::with_target(
            link_type,
            Some(LinkTarget::Element(ElementRef {
                id: ElementId(element_id),
                site_id: SiteId(site_id),
            })),
        )
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.decorations.link_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.decorations.link_title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.decorations.aria_label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_classes(mut self, classes: impl Into<String>) -> Self {
        self.decorations.classes = Some(classes.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.decorations.custom_attributes.push(CustomAttribute {
            attribute: attribute.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_url_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.decorations.url_suffix = Some(suffix.into());
        self
    }

    #[must_use]
    pub fn with_new_window(mut self, new_window: bool) -> Self {
        self.decorations.new_window = Some(new_window);
        self
    }

    pub fn is_element_link(&self) -> bool {
        matches!(self.target, Some(LinkTarget::Element(_)))
    }

    pub fn element_ref(&self) -> Option<ElementRef> {
        match self.target {
            Some(LinkTarget::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_id(&self) -> Option<ElementId> {
        self.element_ref().map(|element| element.id)
    }

    pub fn site_id(&self) -> Option<SiteId> {
        self.element_ref().map(|element| element.site_id)
    }

    /// Check the link against the registered link types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLinkType`] when the handle is not registered and
    /// [`Error::TargetKindMismatch`] when the stored target does not have the
    /// shape the link type expects.
    pub fn validate(&self, registry: &LinkTypeRegistry) -> Result<()> {
        let link_type = registry
            .get(&self.link_type)
            .ok_or_else(|| Error::UnknownLinkType(self.link_type.clone()))?;

        match &self.target {
            Some(target) if target.kind() != link_type.target_kind() => {
                Err(Error::TargetKindMismatch {
                    handle: self.link_type.clone(),
                    expected: link_type.target_kind().to_string(),
                    actual: target.kind().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Deserialize a stored value and validate it against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLinkValue`] when the value cannot be parsed at
    /// all, or the validation errors of [`LinkValue::validate`].
    pub fn from_stored(value: Value, registry: &LinkTypeRegistry) -> Result<Self> {
        let link: LinkValue =
            serde_json::from_value(value).map_err(|e| Error::InvalidLinkValue(e.to_string()))?;
        link.validate(registry)?;
        Ok(link)
    }

    /// Serialized form persisted with the field value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`] if serialization fails.
    pub fn to_stored(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::from)
    }

    /// Resolve into a renderable link through the element cache.
    pub fn resolve(&self, resolver: &ElementLinkResolver<'_>) -> RenderableLink {
        resolver.resolve(self)
    }
}
