//! Schema model
//!
//! Immutable descriptors for tables, columns and relationships, plus the
//! builder types callers use to register entity schemas explicitly. Replaces
//! runtime attribute scanning: invalid configurations are caught when the
//! descriptor is built, not at first use.

mod column;
mod relationship;
mod table;

pub use column::{ColumnDef, ColumnDescriptor, DefaultValue, SqlType};
pub use relationship::{RelationshipDef, RelationshipDescriptor};
pub use table::{TableDef, TableDescriptor};
