//! Where field configuration comes from

use super::FieldId;
use crate::error::{Error, Result};
use crate::sync::RwLockExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Supplies the raw stored configuration of a field.
///
/// Returns `Ok(None)` when the field does not exist.
pub trait FieldConfigSource: Send + Sync {
    fn field_config(&self, field_id: FieldId) -> Result<Option<Value>>;
}

/// In-memory configuration source for tests and embedding.
#[derive(Default)]
pub struct MemoryConfigSource {
    configs: RwLock<HashMap<FieldId, Value>>,
    loads: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the configuration of a field.
    pub fn set(&self, field_id: FieldId, config: Value) {
        self.configs.write_recovered().insert(field_id, config);
    }

    pub fn remove(&self, field_id: FieldId) -> Option<Value> {
        self.configs.write_recovered().remove(&field_id)
    }

    /// Make every subsequent load fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many times configuration was loaded.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl FieldConfigSource for MemoryConfigSource {
    fn field_config(&self, field_id: FieldId) -> Result<Option<Value>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ConfigSource(format!(
                "configuration of field {field_id} is unavailable"
            )));
        }
        Ok(self.configs.read_recovered().get(&field_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_source() {
        let source = MemoryConfigSource::new();
        source.set(FieldId(1), json!({"uid": "a"}));

        assert_eq!(source.field_config(FieldId(1)).unwrap(), Some(json!({"uid": "a"})));
        assert_eq!(source.field_config(FieldId(2)).unwrap(), None);
        assert_eq!(source.load_count(), 2);

        source.remove(FieldId(1));
        assert_eq!(source.field_config(FieldId(1)).unwrap(), None);

        source.set_failing(true);
        assert!(matches!(
            source.field_config(FieldId(1)),
            Err(Error::ConfigSource(_))
        ));
    }
}
