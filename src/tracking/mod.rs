//! Change tracking
//!
//! Tracks entity instances across their lifecycle (attach, modify, delete)
//! and detects field-level changes by comparing each instance against the
//! value snapshot taken when tracking began. The tracker never talks to the
//! store; it only records what the unit of work has to persist.

mod entry;
mod tracker;

pub use entry::{EntityState, Entry};
pub use tracker::ChangeTracker;
