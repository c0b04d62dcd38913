//! Entity traits
//!
//! `Record` gives the engine uniform, reflection-free access to an entity's
//! column values by property identifier; `Entity` adds the static schema
//! definition. Implementations are plain match statements; a property the
//! entity does not know is read as `Null` and ignored on write, which is the
//! best-effort contract row materialization relies on.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::schema::TableDef;
use crate::value::Value;

/// Property-indexed access to an entity's column values.
///
/// Object safe: the change tracker stores entities behind
/// `Rc<RefCell<dyn Record>>` handles.
pub trait Record {
    /// Reads the value behind the property identifier, `Null` when unknown.
    fn get(&self, property: &str) -> Value;

    /// Writes the value behind the property identifier; unknown properties
    /// and unconvertible values are ignored.
    fn set(&mut self, property: &str, value: Value);
}

/// A mapped entity type with a registered schema definition.
pub trait Entity: Record + Default + 'static {
    /// Stable entity identifier, unique within a context.
    fn entity_id() -> &'static str;

    /// The explicit schema definition for this entity.
    fn definition() -> TableDef;
}

/// A shared handle to a tracked record.
///
/// Carries the same allocation under two coercions: type-erased for the
/// tracker, and `Any` so the context can hand the concrete entity type back
/// out of the identity map.
#[derive(Clone)]
pub struct RecordHandle {
    record: Rc<RefCell<dyn Record>>,
    any: Rc<dyn Any>,
}

impl RecordHandle {
    pub fn new<R: Record + 'static>(typed: Rc<RefCell<R>>) -> Self {
        Self {
            record: typed.clone(),
            any: typed,
        }
    }

    /// The type-erased record.
    pub fn record(&self) -> Rc<RefCell<dyn Record>> {
        Rc::clone(&self.record)
    }

    /// Recovers the concrete entity type, if it matches.
    pub fn downcast<R: Record + 'static>(&self) -> Option<Rc<RefCell<R>>> {
        Rc::clone(&self.any).downcast::<RefCell<R>>().ok()
    }

    /// Reads a property value without exposing the borrow.
    pub fn get(&self, property: &str) -> Value {
        self.record.borrow().get(property)
    }

    /// Writes a property value.
    pub fn set(&self, property: &str, value: Value) {
        self.record.borrow_mut().set(property, value);
    }

    pub(crate) fn ptr_eq(&self, other: &RecordHandle) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.record), Rc::as_ptr(&other.record))
    }
}

impl std::fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHandle").finish_non_exhaustive()
    }
}
