//! Field settings cache
//!
//! Keeps parsed [`FieldSettings`] per field, plus the UID and block-type
//! indexes needed to invalidate the right fields when project config changes.
//!
//! Configs are loaded and parsed outside the lock. Every invalidation bumps
//! a generation, and a parse that started before the bump is not cached.

use super::{BlockTypeId, ConfigAction, ConfigEvent, ConfigPath, FieldConfigSource, FieldId, FieldSettings};
use crate::error::{Error, Result};
use crate::events::InvalidationEvents;
use crate::link::LinkTypeRegistry;
use crate::sync::RwLockExt;
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct FieldCacheState {
    settings: HashMap<FieldId, Arc<FieldSettings>>,
    /// Field UID to id, learned from parsed configs
    field_uids: HashMap<String, FieldId>,
    /// Fields nested in each block type. May list fields no longer cached.
    block_fields: HashMap<BlockTypeId, BTreeSet<FieldId>>,
    block_type_uids: HashMap<String, BlockTypeId>,
    /// Bumped by every invalidation
    generation: u64,
}

/// Loads of one field before serving the result uncached.
const MAX_LOAD_ATTEMPTS: usize = 3;

impl FieldCacheState {
    fn index(&mut self, settings: &FieldSettings) {
        self.field_uids
            .insert(settings.uid.clone(), settings.field_id);
        if let Some(block_type) = &settings.block_type {
            self.block_fields
                .entry(block_type.id)
                .or_default()
                .insert(settings.field_id);
            self.block_type_uids
                .insert(block_type.uid.clone(), block_type.id);
        }
    }

    fn forget_field(&mut self, field_id: FieldId) {
        self.field_uids.retain(|_, id| *id != field_id);
        for fields in self.block_fields.values_mut() {
            fields.remove(&field_id);
        }
    }
}

/// Process-scoped cache of parsed field settings.
pub struct FieldCache {
    state: RwLock<FieldCacheState>,
    events: Arc<InvalidationEvents>,
}

impl FieldCache {
    pub fn new(events: Arc<InvalidationEvents>) -> Self {
        Self {
            state: RwLock::new(FieldCacheState::default()),
            events,
        }
    }

    /// Settings of a field, parsed once and then served from the cache.
    ///
    /// # Errors
    ///
    /// - [`Error::FieldNotFound`] when the source has no such field
    /// - [`Error::InvalidFieldConfig`] when its configuration does not parse
    /// - whatever the source returns when loading fails
    ///
    /// Failures are not cached; the next call tries again. A field saved
    /// while its config was loading is loaded again.
    pub fn get_field_settings(
        &self,
        field_id: FieldId,
        source: &dyn FieldConfigSource,
        registry: &LinkTypeRegistry,
    ) -> Result<Arc<FieldSettings>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let since = {
                let state = self.state.read_recovered();
                if let Some(settings) = state.settings.get(&field_id) {
                    return Ok(Arc::clone(settings));
                }
                state.generation
            };

            let config = source
                .field_config(field_id)?
                .ok_or(Error::FieldNotFound(field_id))?;
            let parsed = Arc::new(FieldSettings::from_config(field_id, config, registry)?);
            debug!("Parsed settings of link field {field_id} ('{}')", parsed.handle);

            let mut state = self.state.write_recovered();
            // Another thread may have parsed the same field meanwhile
            if let Some(settings) = state.settings.get(&field_id) {
                return Ok(Arc::clone(settings));
            }
            if state.generation == since {
                state.index(&parsed);
                state.settings.insert(field_id, Arc::clone(&parsed));
                return Ok(parsed);
            }
            if attempts >= MAX_LOAD_ATTEMPTS {
                debug!("Link field {field_id} keeps changing, serving its settings uncached");
                return Ok(parsed);
            }
        }
    }

    /// Settings of a field if already cached.
    pub fn cached(&self, field_id: FieldId) -> Option<Arc<FieldSettings>> {
        self.state.read_recovered().settings.get(&field_id).cloned()
    }

    /// Record that a field lives inside a block type, before its settings
    /// have been parsed.
    pub fn register_block_type(&self, block_type_id: BlockTypeId, field_id: FieldId) {
        self.state
            .write_recovered()
            .block_fields
            .entry(block_type_id)
            .or_default()
            .insert(field_id);
    }

    /// Record a block type's UID so config events can find it.
    pub fn register_block_type_uid(&self, uid: impl Into<String>, block_type_id: BlockTypeId) {
        self.state
            .write_recovered()
            .block_type_uids
            .insert(uid.into(), block_type_id);
    }

    /// Drop a field's settings. Returns whether anything was cached.
    pub fn on_save_field(&self, field_id: FieldId) -> bool {
        let removed = {
            let mut state = self.state.write_recovered();
            state.generation += 1;
            state.settings.remove(&field_id).is_some()
        };
        self.notify(field_id, removed);
        removed
    }

    /// Drop a field's settings and everything indexed about it.
    pub fn on_delete_field(&self, field_id: FieldId) -> bool {
        let removed = {
            let mut state = self.state.write_recovered();
            state.generation += 1;
            state.forget_field(field_id);
            state.settings.remove(&field_id).is_some()
        };
        self.notify(field_id, removed);
        removed
    }

    /// Drop the settings of every field nested in the block type.
    pub fn on_save_block_type(&self, block_type_id: BlockTypeId) -> usize {
        let removed = {
            let mut state = self.state.write_recovered();
            let fields = state
                .block_fields
                .get(&block_type_id)
                .cloned()
                .unwrap_or_default();
            Self::remove_fields(&mut state, &fields)
        };
        self.notify_all(&removed);
        removed.len()
    }

    /// Like [`on_save_block_type`](Self::on_save_block_type), and forget the
    /// block type.
    pub fn on_delete_block_type(&self, block_type_id: BlockTypeId) -> usize {
        let removed = {
            let mut state = self.state.write_recovered();
            let fields = state
                .block_fields
                .remove(&block_type_id)
                .unwrap_or_default();
            state.block_type_uids.retain(|_, id| *id != block_type_id);
            Self::remove_fields(&mut state, &fields)
        };
        self.notify_all(&removed);
        removed.len()
    }

    /// Apply a project-config change. Returns how many fields were dropped.
    ///
    /// UIDs the cache has never seen are ignored.
    pub fn on_config_event(&self, event: &ConfigEvent) -> usize {
        match &event.path {
            ConfigPath::Field(uid) => {
                let Some(field_id) = self.state.read_recovered().field_uids.get(uid).copied()
                else {
                    trace!("Config change for unknown field uid {uid}");
                    return 0;
                };
                let removed = match event.action {
                    ConfigAction::Removed => self.on_delete_field(field_id),
                    ConfigAction::Added | ConfigAction::Updated => self.on_save_field(field_id),
                };
                usize::from(removed)
            }
            ConfigPath::BlockType(uid) => {
                let Some(block_type_id) =
                    self.state.read_recovered().block_type_uids.get(uid).copied()
                else {
                    trace!("Config change for unknown block type uid {uid}");
                    return 0;
                };
                match event.action {
                    ConfigAction::Removed => self.on_delete_block_type(block_type_id),
                    ConfigAction::Added | ConfigAction::Updated => {
                        self.on_save_block_type(block_type_id)
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.read_recovered().settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached field, keeping the indexes.
    pub fn clear(&self) {
        let removed: Vec<FieldId> = {
            let mut state = self.state.write_recovered();
            state.generation += 1;
            state.settings.drain().map(|(field_id, _)| field_id).collect()
        };
        self.notify_all(&removed);
    }

    fn remove_fields(state: &mut FieldCacheState, fields: &BTreeSet<FieldId>) -> Vec<FieldId> {
        state.generation += 1;
        fields
            .iter()
            .copied()
            .filter(|field_id| state.settings.remove(field_id).is_some())
            .collect()
    }

    fn notify(&self, field_id: FieldId, removed: bool) {
        if removed {
            debug!("Invalidated settings of link field {field_id}");
            self.events.notify_field(field_id);
        }
    }

    fn notify_all(&self, removed: &[FieldId]) {
        for field_id in removed {
            self.notify(*field_id, true);
        }
    }
}
