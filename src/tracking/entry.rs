//! A single tracked entity entry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::RecordHandle;
use crate::error::OrmResult;
use crate::schema::TableDescriptor;
use crate::value::{Key, Value};

/// Lifecycle state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Tracked and identical to its snapshot.
    Unchanged,
    /// Scheduled for INSERT.
    Added,
    /// At least one non-key field differs from the snapshot.
    Modified,
    /// Scheduled for DELETE.
    Deleted,
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityState::Unchanged => "Unchanged",
            EntityState::Added => "Added",
            EntityState::Modified => "Modified",
            EntityState::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// One tracked entity instance: its shared handle, lifecycle state, the
/// value snapshot taken when tracking began, and the changed-property list
/// produced by change detection.
pub struct Entry {
    entity_id: String,
    descriptor: Arc<TableDescriptor>,
    handle: RecordHandle,
    state: EntityState,
    snapshot: HashMap<String, Value>,
    changed: Vec<String>,
}

impl Entry {
    pub(crate) fn new(
        entity_id: String,
        descriptor: Arc<TableDescriptor>,
        handle: RecordHandle,
        state: EntityState,
    ) -> Self {
        let snapshot = take_snapshot(&descriptor, &handle);
        Self {
            entity_id,
            descriptor,
            handle,
            state,
            snapshot,
            changed: Vec::new(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    pub fn descriptor(&self) -> &Arc<TableDescriptor> {
        &self.descriptor
    }

    pub fn handle(&self) -> RecordHandle {
        self.handle.clone()
    }

    /// Properties found changed by the last detection pass, in descriptor
    /// column order.
    pub fn changed(&self) -> &[String] {
        &self.changed
    }

    /// Current primary-key value read from the instance.
    pub fn key_value(&self) -> Value {
        self.handle.get(&self.descriptor.primary_key().property)
    }

    /// Current identity key; fails when the primary key is null or of an
    /// unsupported type.
    pub fn key(&self) -> OrmResult<Key> {
        Key::from_value(&self.key_value())
    }

    pub(crate) fn is_same_instance(&self, other: &RecordHandle) -> bool {
        self.handle.ptr_eq(other)
    }

    /// Compares the instance against its snapshot and updates the state.
    ///
    /// Only non-key columns participate; an Unchanged entry whose values
    /// differ becomes Modified, a Modified entry whose values drifted back
    /// becomes Unchanged again. Added and Deleted entries are left alone.
    /// Returns whether the entry ended up Modified.
    pub(crate) fn detect(&mut self) -> bool {
        if matches!(self.state, EntityState::Added | EntityState::Deleted) {
            return false;
        }

        self.changed.clear();
        for column in &self.descriptor.columns {
            if column.primary_key {
                continue;
            }
            let current = self.handle.get(&column.property);
            if self.snapshot.get(&column.property) != Some(&current) {
                self.changed.push(column.property.clone());
            }
        }

        self.state = if self.changed.is_empty() {
            EntityState::Unchanged
        } else {
            EntityState::Modified
        };
        self.state == EntityState::Modified
    }

    /// Re-baselines the snapshot after a successful save.
    pub(crate) fn accept(&mut self) {
        self.snapshot = take_snapshot(&self.descriptor, &self.handle);
        self.changed.clear();
        self.state = EntityState::Unchanged;
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("entity_id", &self.entity_id)
            .field("state", &self.state)
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

fn take_snapshot(descriptor: &TableDescriptor, handle: &RecordHandle) -> HashMap<String, Value> {
    descriptor
        .columns
        .iter()
        .map(|c| (c.property.clone(), handle.get(&c.property)))
        .collect()
}
