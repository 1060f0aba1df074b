//! Field configuration and the field cache
//!
//! A link field's configuration says which link types authors may pick and
//! how each is set up. Parsing it is not free, so [`FieldCache`] keeps the
//! parsed [`FieldSettings`] per field until the field (or the block type it
//! lives in) changes.

mod cache;
mod source;

pub use cache::FieldCache;
pub use source::{FieldConfigSource, MemoryConfigSource};

use crate::config::unpack_associative;
use crate::error::{Error, Result};
use crate::link::LinkTypeRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Field identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a nested block type (matrix-like container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockTypeId(pub u64);

impl fmt::Display for BlockTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block type a nested field belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTypeRef {
    pub id: BlockTypeId,
    pub uid: String,
}

/// Where a project-config change happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    /// `fields.<uid>`
    Field(String),
    /// `matrixBlockTypes.<uid>` and similar nested containers
    BlockType(String),
}

/// Kind of project-config change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Added,
    Updated,
    Removed,
}

/// A project-config change keyed by UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEvent {
    pub path: ConfigPath,
    pub action: ConfigAction,
}

impl ConfigEvent {
    pub fn field(uid: impl Into<String>, action: ConfigAction) -> Self {
        Self {
            path: ConfigPath::Field(uid.into()),
            action,
        }
    }

    pub fn block_type(uid: impl Into<String>, action: ConfigAction) -> Self {
        Self {
            path: ConfigPath::BlockType(uid.into()),
            action,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Settings of one link type within one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTypeSettings {
    /// Handle of the registered link type
    pub handle: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Label shown to authors instead of the type's display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Element sources authors may pick from (element links only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Type-specific settings this crate does not interpret
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl LinkTypeSettings {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            enabled: true,
            label: None,
            sources: Vec::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFieldConfig {
    uid: String,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    block_type: Option<BlockTypeRef>,
    #[serde(default)]
    settings: Value,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawFieldSettings {
    #[serde(default)]
    multiple_links: bool,
    #[serde(default)]
    default_link_type: Option<String>,
    #[serde(default)]
    new_window: bool,
    #[serde(default)]
    link_types: Vec<LinkTypeSettings>,
}

/// Effective configuration of one link field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSettings {
    pub field_id: FieldId,
    pub uid: String,
    pub handle: String,
    /// Set when the field lives inside a block type
    pub block_type: Option<BlockTypeRef>,
    /// When false only the first link of a value is rendered
    pub multiple_links: bool,
    pub default_link_type: Option<String>,
    /// Applied to links that do not say whether to open a new window
    pub new_window_default: bool,
    pub link_types: Vec<LinkTypeSettings>,
}

impl FieldSettings {
    /// Parse stored field configuration and check it against the registry.
    ///
    /// Packed associative structures (as written by a project-config
    /// rebuild) are unpacked first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFieldConfig`] when the configuration cannot be
    /// parsed, names an unregistered or duplicate link type, or picks a
    /// default link type that is not enabled.
    pub fn from_config(field_id: FieldId, config: Value, registry: &LinkTypeRegistry) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidFieldConfig {
            field: field_id,
            reason,
        };

        let raw: RawFieldConfig = serde_json::from_value(unpack_associative(config))
            .map_err(|e| invalid(e.to_string()))?;
        let settings: RawFieldSettings = match raw.settings {
            Value::Null => RawFieldSettings::default(),
            settings => serde_json::from_value(settings).map_err(|e| invalid(e.to_string()))?,
        };

        let mut seen = HashSet::new();
        for link_type in &settings.link_types {
            if !registry.contains(&link_type.handle) {
                return Err(invalid(format!(
                    "link type '{}' is not registered",
                    link_type.handle
                )));
            }
            if !seen.insert(link_type.handle.as_str()) {
                return Err(invalid(format!(
                    "link type '{}' is configured twice",
                    link_type.handle
                )));
            }
        }

        let field = Self {
            field_id,
            uid: raw.uid,
            handle: raw.handle,
            block_type: raw.block_type,
            multiple_links: settings.multiple_links,
            default_link_type: settings.default_link_type,
            new_window_default: settings.new_window,
            link_types: settings.link_types,
        };

        if let Some(default) = &field.default_link_type {
            if !field.allows(default) {
                return Err(invalid(format!(
                    "default link type '{default}' is not enabled"
                )));
            }
        }
        Ok(field)
    }

    /// Whether authors may use the link type in this field.
    pub fn allows(&self, handle: &str) -> bool {
        self.link_types
            .iter()
            .any(|link_type| link_type.enabled && link_type.handle == handle)
    }

    pub fn link_type(&self, handle: &str) -> Option<&LinkTypeSettings> {
        self.link_types
            .iter()
            .find(|link_type| link_type.handle == handle)
    }

    /// Enabled link type handles, in configured order.
    pub fn enabled_link_types(&self) -> impl Iterator<Item = &str> {
        self.link_types
            .iter()
            .filter(|link_type| link_type.enabled)
            .map(|link_type| link_type.handle.as_str())
    }
}
