//! Schema migrations
//!
//! A migration is a flat, serializable record of ordered up/down statements.
//! The generator diffs the live schema against the registered model; the
//! executor applies migrations transactionally and records them in a history
//! table.

mod executor;
mod generator;

pub use executor::{AppliedMigration, MigrationExecutor};
pub use generator::generate;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// One schema migration: identifier, human-readable name, and the ordered
/// statement lists for applying and reverting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub id: String,
    pub name: String,
    pub up_statements: Vec<String>,
    pub down_statements: Vec<String>,
}

impl Migration {
    /// Serializes the migration to pretty-printed JSON.
    pub fn to_json(&self) -> OrmResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| OrmError::Store(Box::new(e)))
    }

    /// Deserializes a migration from JSON.
    pub fn from_json(json: &str) -> OrmResult<Self> {
        serde_json::from_str(json).map_err(|e| OrmError::Store(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_migration_json_round_trip() {
        let migration = Migration {
            id: "20250117093000".to_string(),
            name: "add_doctor".to_string(),
            up_statements: vec![
                "CREATE TABLE \"doctor\" (\n    \"id\" BIGSERIAL PRIMARY KEY\n);".to_string(),
            ],
            down_statements: vec!["DROP TABLE IF EXISTS \"doctor\";".to_string()],
        };

        let json = migration.to_json().unwrap();
        let restored = Migration::from_json(&json).unwrap();
        assert_eq!(restored, migration);
    }

    #[test]
    fn test_invalid_json_fails() {
        assert!(Migration::from_json("{not json").is_err());
    }
}
