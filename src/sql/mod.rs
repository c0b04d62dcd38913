//! SQL statement builders
//!
//! Pure, side-effect-free functions from a `TableDescriptor` to PostgreSQL
//! statement text plus the ordered column list to bind. Placeholders are
//! positional (`$1`, `$2`, ...); the driver adapter owns the actual binding.

pub mod ddl;
pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

pub use ddl::{create_table, data_type, drop_table};
pub use delete::{delete, delete_where};
pub use insert::insert;
pub use select::{select, select_all, select_by_primary_key};
pub use update::update;
