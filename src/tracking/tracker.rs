//! The change tracker itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::entity::RecordHandle;
use crate::error::{OrmError, OrmResult};
use crate::schema::TableDescriptor;
use crate::tracking::entry::{EntityState, Entry};
use crate::value::Key;

/// Map slot of a tracked entry. Entries whose primary key is not yet set
/// (added entities awaiting a generated key) get a synthetic pending slot so
/// they still have a stable, ordered position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    Key(Key),
    Pending(u64),
}

type EntryKey = (String, Slot);

/// Tracks entity instances by identity (entity id plus primary-key value)
/// and records the operation each one needs at save time.
///
/// Iteration order over entries is deterministic: entity id first, keyed
/// entries before pending ones.
#[derive(Default)]
pub struct ChangeTracker {
    entries: BTreeMap<EntryKey, Entry>,
    next_pending: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Starts tracking an existing instance as Unchanged.
    ///
    /// Attaching the same instance twice is a no-op; attaching a different
    /// instance under an already-tracked identity is a conflict. The primary
    /// key must be set.
    pub fn attach(
        &mut self,
        entity_id: &str,
        descriptor: Arc<TableDescriptor>,
        handle: RecordHandle,
    ) -> OrmResult<Key> {
        let key = Key::from_value(&handle.get(&descriptor.primary_key().property))?;
        let map_key = (entity_id.to_string(), Slot::Key(key.clone()));

        if let Some(existing) = self.entries.get(&map_key) {
            if existing.is_same_instance(&handle) {
                return Ok(key);
            }
            return Err(OrmError::TrackingConflict(format!(
                "entity '{}' with key '{}' is already tracked by another instance",
                entity_id, key
            )));
        }

        debug!(entity = entity_id, key = %key, "attaching entity");
        self.entries.insert(
            map_key,
            Entry::new(
                entity_id.to_string(),
                descriptor,
                handle,
                EntityState::Unchanged,
            ),
        );
        Ok(key)
    }

    /// Starts tracking a new instance as Added.
    ///
    /// An unset (null) primary key is allowed; the entry is parked in a
    /// pending slot until the save assigns the generated key. Re-adding an
    /// already-tracked instance switches its state to Added in place; a
    /// different instance under the same key evicts the old entry.
    pub fn mark_added(
        &mut self,
        entity_id: &str,
        descriptor: Arc<TableDescriptor>,
        handle: RecordHandle,
    ) -> OrmResult<()> {
        let pk_value = handle.get(&descriptor.primary_key().property);
        let slot = match Key::from_value(&pk_value) {
            Ok(key) => Slot::Key(key),
            Err(_) => match self.pending_slot_of(entity_id, &handle) {
                Some(slot) => slot,
                None => {
                    self.next_pending += 1;
                    Slot::Pending(self.next_pending)
                }
            },
        };
        let map_key = (entity_id.to_string(), slot);

        if let Some(existing) = self.entries.get_mut(&map_key) {
            if existing.is_same_instance(&handle) {
                existing.set_state(EntityState::Added);
                return Ok(());
            }
            debug!(entity = entity_id, "evicting stale entry for re-added key");
            self.entries.remove(&map_key);
        }

        debug!(entity = entity_id, "tracking new entity as added");
        self.entries.insert(
            map_key,
            Entry::new(entity_id.to_string(), descriptor, handle, EntityState::Added),
        );
        Ok(())
    }

    /// Schedules an instance for deletion.
    ///
    /// The primary key must be set. The instance is attached first when it is
    /// not tracked yet (evicting a stale entry under the same key); the entry
    /// then moves to Deleted regardless of its prior state.
    pub fn mark_deleted(
        &mut self,
        entity_id: &str,
        descriptor: Arc<TableDescriptor>,
        handle: RecordHandle,
    ) -> OrmResult<Key> {
        let key = Key::from_value(&handle.get(&descriptor.primary_key().property))?;
        let map_key = (entity_id.to_string(), Slot::Key(key.clone()));

        match self.entries.get_mut(&map_key) {
            Some(existing) if existing.is_same_instance(&handle) => {
                existing.set_state(EntityState::Deleted);
            }
            _ => {
                debug!(entity = entity_id, key = %key, "attaching entity as deleted");
                let entry = Entry::new(
                    entity_id.to_string(),
                    descriptor,
                    handle,
                    EntityState::Deleted,
                );
                self.entries.insert(map_key, entry);
            }
        }
        Ok(key)
    }

    /// The pending slot already holding this exact instance, if any.
    fn pending_slot_of(&self, entity_id: &str, handle: &RecordHandle) -> Option<Slot> {
        self.entries
            .iter()
            .find(|((id, slot), entry)| {
                id == entity_id
                    && matches!(slot, Slot::Pending(_))
                    && entry.is_same_instance(handle)
            })
            .map(|((_, slot), _)| slot.clone())
    }

    /// Stops tracking the given identity, if tracked.
    pub fn detach(&mut self, entity_id: &str, key: &Key) -> bool {
        self.entries
            .remove(&(entity_id.to_string(), Slot::Key(key.clone())))
            .is_some()
    }

    /// Drops every tracked entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_pending = 0;
    }

    /// Runs snapshot comparison over every tracked entry and returns the
    /// number of entries that came out Modified.
    pub fn detect_changes(&mut self) -> usize {
        let modified = self
            .entries
            .values_mut()
            .map(|entry| entry.detect())
            .filter(|modified| *modified)
            .count();
        debug!(modified, "change detection finished");
        modified
    }

    /// The tracked entry for the given identity, if any.
    pub fn get(&self, entity_id: &str, key: &Key) -> Option<&Entry> {
        self.entries
            .get(&(entity_id.to_string(), Slot::Key(key.clone())))
    }

    /// The shared handle for the given identity, if tracked. This is how the
    /// context keeps one instance per row (the identity map).
    pub fn handle(&self, entity_id: &str, key: &Key) -> Option<RecordHandle> {
        self.get(entity_id, key).map(Entry::handle)
    }

    /// All tracked entries in deterministic order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Runs the save callback over every tracked entry in deterministic
    /// order, settling each entry as soon as its own statement succeeded:
    /// a Deleted entry is dropped, everything else is re-baselined as
    /// Unchanged under the key it now carries. A failure leaves the entries
    /// flushed so far settled and the rest untouched, so a retry only
    /// re-runs what did not commit. Returns the sum of the callback's
    /// written counts.
    pub(crate) fn flush<F>(&mut self, mut apply: F) -> OrmResult<usize>
    where
        F: FnMut(&mut Entry) -> OrmResult<bool>,
    {
        let mut affected = 0;
        let slots: Vec<EntryKey> = self.entries.keys().cloned().collect();
        for slot in slots {
            let Some(entry) = self.entries.get_mut(&slot) else {
                continue;
            };
            if apply(entry)? {
                affected += 1;
            }
            self.settle(slot)?;
        }
        Ok(affected)
    }

    fn settle(&mut self, slot: EntryKey) -> OrmResult<()> {
        let Some(mut entry) = self.entries.remove(&slot) else {
            return Ok(());
        };
        if entry.state() == EntityState::Deleted {
            return Ok(());
        }
        entry.accept();
        let key = entry.key()?;
        self.entries.insert((slot.0, Slot::Key(key)), entry);
        Ok(())
    }
}
