//! Error handling module
//!
//! Provides the unified error taxonomy for the engine. Builder-time and
//! tracking-time errors fail fast before any statement reaches the store;
//! store failures are surfaced with their driver source attached.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum OrmError {
    /// Invalid schema definition: zero/multiple primary keys, unresolved
    /// foreign key at generation time, unmapped column.
    #[error("Schema definition error: {0}")]
    SchemaDefinition(String),

    /// A predicate/order construct outside the closed query grammar.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Duplicate tracked key, or a null/unset primary key where one is
    /// required.
    #[error("Tracking conflict: {0}")]
    TrackingConflict(String),

    /// Update requested with an empty changed-column set, or with only the
    /// primary key changed.
    #[error("Update target error: {0}")]
    UpdateTarget(String),

    /// Migration applied twice, or rolled back without being applied.
    #[error("Migration conflict: {0}")]
    MigrationConflict(String),

    /// Entity lookup by key matched no row.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure surfaced from the underlying driver.
    #[error("Store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Connection not established or lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error (environment, connection string).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<postgres::Error> for OrmError {
    fn from(err: postgres::Error) -> Self {
        OrmError::Store(Box::new(err))
    }
}

/// Result type alias used throughout the engine
pub type OrmResult<T> = Result<T, OrmError>;

impl OrmError {
    /// Helper for store errors raised outside the postgres driver
    /// (test doubles, adapter-internal failures).
    pub fn store(msg: impl Into<String>) -> Self {
        OrmError::Store(msg.into().into())
    }
}
