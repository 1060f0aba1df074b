//! Storage backend trait and implementations
//!
//! A link field stores its value as a string: the list of the field's
//! [`LinkValue`]s in some serialized form.

use crate::error::{Error, Result};
use crate::link::LinkValue;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Trait for storage backend implementations
pub trait StorageBackend: Clone + Send + Sync {
    /// Serialize data to string
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    /// Deserialize data from string
    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;

    /// Encode a field value.
    fn encode_links(&self, links: &[LinkValue]) -> Result<String> {
        self.serialize(&links)
    }

    /// Decode a field value.
    ///
    /// Blank content is an empty field. A single stored object (rather than
    /// a list) is read as a one-link value.
    fn decode_links(&self, content: &str) -> Result<Vec<LinkValue>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let stored: Value = self
            .deserialize(content)
            .map_err(|e| Error::InvalidLinkValue(e.to_string()))?;
        let items = match stored {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|e| Error::InvalidLinkValue(e.to_string()))
            })
            .collect()
    }
}

// =============================================================================
// JSON Storage Implementation
// =============================================================================

/// JSON storage backend (default)
#[derive(Debug, Clone, Default)]
pub struct JsonStorage {
    /// Pretty print JSON output
    pretty: bool,
}

impl JsonStorage {
    /// Create a new JSON storage backend with pretty printing enabled
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a compact JSON storage (no pretty printing)
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl StorageBackend for JsonStorage {
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(data).map_err(Error::from)
        } else {
            serde_json::to_string(data).map_err(Error::from)
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(Error::from)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, SiteId};

    fn links() -> Vec<LinkValue> {
        vec![
            LinkValue::url("url", "https://example.com").with_text("Example"),
            LinkValue::element("entry", 5, 1).with_new_window(true),
        ]
    }

    #[test]
    fn test_json_serialize_pretty() {
        let storage = JsonStorage::new();
        let json = storage.encode_links(&links()).unwrap();
        assert!(json.contains('\n')); // Pretty printed
        assert!(json.contains("\"type\": \"url\""));
    }

    #[test]
    fn test_json_serialize_compact() {
        let storage = JsonStorage::compact();
        let json = storage.encode_links(&links()).unwrap();
        assert!(!json.contains('\n')); // Compact
        assert_eq!(storage.decode_links(&json).unwrap(), links());
    }

    #[test]
    fn test_decode_blank_and_single() {
        let storage = JsonStorage::new();
        assert!(storage.decode_links("").unwrap().is_empty());
        assert!(storage.decode_links("null").unwrap().is_empty());

        let single = storage
            .decode_links(r#"{"type":"entry","target":{"kind":"element","id":["7"],"siteId":2}}"#)
            .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].element_id(), Some(ElementId(7)));
        assert_eq!(single[0].site_id(), Some(SiteId(2)));
    }

    #[test]
    fn test_decode_invalid() {
        let storage = JsonStorage::new();
        assert!(matches!(
            storage.decode_links("{not json"),
            Err(Error::InvalidLinkValue(_))
        ));
        assert!(matches!(
            storage.decode_links(r#"[{"target":{"kind":"url","url":"x"}}]"#),
            Err(Error::InvalidLinkValue(_))
        ));
    }
}
