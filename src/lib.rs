//! Explicit-schema relational mapping for PostgreSQL.
//!
//! Entities register an explicit table definition (no reflection, no
//! attribute scanning); the engine builds validated descriptors from it and
//! drives everything else off them: SQL generation, a snapshot-based change
//! tracker with an identity map, a closed predicate grammar translated to
//! parameterized WHERE fragments, live-schema introspection, and generated,
//! transactional migrations.
//!
//! The [`Context`] is the entry point: register entities, then
//! find/list/add/remove and [`Context::save_changes`], or diff the live
//! schema with [`Context::generate_migration`].

pub mod config;
pub mod context;
pub mod driver;
pub mod entity;
pub mod error;
pub mod introspect;
pub mod migrate;
pub mod query;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod tracking;
pub mod value;

#[cfg(test)]
pub(crate) mod testkit;

pub use config::DatabaseConfig;
pub use context::Context;
pub use entity::{Entity, Record, RecordHandle};
pub use error::{OrmError, OrmResult};
pub use migrate::{AppliedMigration, Migration, MigrationExecutor};
pub use query::{col, lit, Expr, Query};
pub use registry::SchemaRegistry;
pub use schema::{ColumnDef, DefaultValue, RelationshipDef, SqlType, TableDef};
pub use tracking::{ChangeTracker, EntityState};
pub use value::{Key, Value};
