//! Migration execution against the live store.

use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::migrate::Migration;
use crate::value::Value;

const HISTORY_TABLE: &str = "__migrations_history";

/// One row of the migration-history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: String,
    pub name: String,
}

/// Applies and reverts migrations, recording them in the history table.
///
/// Each direction runs as a single transaction: any statement failure rolls
/// the whole batch back and leaves the history untouched.
pub struct MigrationExecutor<'a> {
    driver: &'a mut dyn Driver,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(driver: &'a mut dyn Driver) -> Self {
        Self { driver }
    }

    /// Applies the migration's up statements and records it as applied.
    pub fn execute_up(&mut self, migration: &Migration) -> OrmResult<()> {
        self.ensure_history_table()?;
        if self.is_applied(&migration.id)? {
            return Err(OrmError::MigrationConflict(format!(
                "migration '{}' ({}) is already applied",
                migration.id, migration.name
            )));
        }

        info!(id = %migration.id, name = %migration.name, "applying migration");
        self.driver.begin()?;
        let result = self.run_up(migration);
        match result {
            Ok(()) => {
                self.driver.commit()?;
                Ok(())
            }
            Err(err) => {
                // Keep the original failure even if the rollback has its own.
                let _ = self.driver.rollback();
                Err(err)
            }
        }
    }

    /// Reverts the migration's down statements in reverse order and removes
    /// the history row.
    pub fn execute_down(&mut self, migration: &Migration) -> OrmResult<()> {
        self.ensure_history_table()?;
        if !self.is_applied(&migration.id)? {
            return Err(OrmError::MigrationConflict(format!(
                "migration '{}' ({}) has not been applied",
                migration.id, migration.name
            )));
        }

        info!(id = %migration.id, name = %migration.name, "reverting migration");
        self.driver.begin()?;
        let result = self.run_down(migration);
        match result {
            Ok(()) => {
                self.driver.commit()?;
                Ok(())
            }
            Err(err) => {
                let _ = self.driver.rollback();
                Err(err)
            }
        }
    }

    /// Whether the given migration id is recorded as applied.
    pub fn is_applied(&mut self, id: &str) -> OrmResult<bool> {
        let rows = self.driver.query(
            &format!(
                "SELECT migration_id FROM \"{}\" WHERE migration_id = $1",
                HISTORY_TABLE
            ),
            &[Value::Text(id.to_string())],
        )?;
        Ok(!rows.is_empty())
    }

    /// All applied migrations in id order.
    pub fn get_applied(&mut self) -> OrmResult<Vec<AppliedMigration>> {
        self.ensure_history_table()?;
        let rows = self.driver.query(
            &format!(
                "SELECT migration_id, migration_name FROM \"{}\" ORDER BY migration_id",
                HISTORY_TABLE
            ),
            &[],
        )?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(AppliedMigration {
                    id: row.text("migration_id")?.to_string(),
                    name: row.text("migration_name")?.to_string(),
                })
            })
            .collect())
    }

    fn run_up(&mut self, migration: &Migration) -> OrmResult<()> {
        for statement in executable(&migration.up_statements) {
            debug!(statement, "running up statement");
            self.driver.execute(statement, &[])?;
        }
        self.driver.execute(
            &format!(
                "INSERT INTO \"{}\" (migration_id, migration_name) VALUES ($1, $2)",
                HISTORY_TABLE
            ),
            &[
                Value::Text(migration.id.clone()),
                Value::Text(migration.name.clone()),
            ],
        )?;
        Ok(())
    }

    fn run_down(&mut self, migration: &Migration) -> OrmResult<()> {
        for statement in executable(&migration.down_statements).rev() {
            debug!(statement, "running down statement");
            self.driver.execute(statement, &[])?;
        }
        self.driver.execute(
            &format!(
                "DELETE FROM \"{}\" WHERE migration_id = $1",
                HISTORY_TABLE
            ),
            &[Value::Text(migration.id.clone())],
        )?;
        Ok(())
    }

    fn ensure_history_table(&mut self) -> OrmResult<()> {
        self.driver.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (\n    \
                 migration_id VARCHAR(255) PRIMARY KEY,\n    \
                 migration_name VARCHAR(500) NOT NULL,\n    \
                 applied_at TIMESTAMP WITHOUT TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
                HISTORY_TABLE
            ),
            &[],
        )?;
        Ok(())
    }
}

fn executable(statements: &[String]) -> impl DoubleEndedIterator<Item = &str> {
    statements
        .iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty() && !s.trim_start().starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{row, MemoryDriver};
    use pretty_assertions::assert_eq;

    fn migration() -> Migration {
        Migration {
            id: "20250117093000".to_string(),
            name: "add_doctor".to_string(),
            up_statements: vec![
                "CREATE TABLE \"doctor\" (\n    \"id\" BIGSERIAL PRIMARY KEY\n);".to_string(),
                "ALTER TABLE \"doctor\" ADD COLUMN \"last_name\" VARCHAR;".to_string(),
            ],
            down_statements: vec![
                "ALTER TABLE \"doctor\" DROP COLUMN IF EXISTS \"last_name\";".to_string(),
                "DROP TABLE IF EXISTS \"doctor\";".to_string(),
            ],
        }
    }

    fn applied_row() -> crate::driver::Row {
        row(vec![(
            "migration_id",
            Value::Text("20250117093000".to_string()),
        )])
    }

    #[test]
    fn test_execute_up_wraps_statements_in_transaction() {
        let mut driver = MemoryDriver::new();
        // History check finds nothing.
        driver.push_rows(vec![]);

        MigrationExecutor::new(&mut driver)
            .execute_up(&migration())
            .unwrap();

        let log = driver.sql_log();
        assert!(log[0].starts_with("CREATE TABLE IF NOT EXISTS \"__migrations_history\""));
        assert!(log[1].starts_with("SELECT migration_id"));
        assert_eq!(log[2], "BEGIN");
        assert!(log[3].starts_with("CREATE TABLE \"doctor\""));
        assert!(log[4].starts_with("ALTER TABLE \"doctor\" ADD COLUMN"));
        assert!(log[5].starts_with("INSERT INTO \"__migrations_history\""));
        assert_eq!(log[6], "COMMIT");
        assert_eq!(
            driver.params_at(5),
            &[
                Value::Text("20250117093000".to_string()),
                Value::Text("add_doctor".to_string()),
            ]
        );
    }

    #[test]
    fn test_execute_up_twice_conflicts_without_statements() {
        let mut driver = MemoryDriver::new();
        // History check finds the id already recorded.
        driver.push_rows(vec![applied_row()]);

        let result = MigrationExecutor::new(&mut driver).execute_up(&migration());
        assert!(matches!(result, Err(OrmError::MigrationConflict(_))));

        // Nothing beyond the history bookkeeping may have run.
        let log = driver.sql_log();
        assert_eq!(log.len(), 2);
        assert!(!log.iter().any(|sql| sql.contains("\"doctor\"")));
    }

    #[test]
    fn test_execute_up_failure_rolls_back_without_history_row() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![]);
        driver.fail_when("ADD COLUMN");

        let result = MigrationExecutor::new(&mut driver).execute_up(&migration());
        assert!(matches!(result, Err(OrmError::Store(_))));

        let log = driver.sql_log();
        assert_eq!(log.last(), Some(&"ROLLBACK"));
        assert!(!log.iter().any(|sql| sql.starts_with("INSERT INTO")));
    }

    #[test]
    fn test_execute_down_runs_in_reverse_and_clears_history() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![applied_row()]);

        MigrationExecutor::new(&mut driver)
            .execute_down(&migration())
            .unwrap();

        let log = driver.sql_log();
        assert_eq!(log[2], "BEGIN");
        assert!(log[3].starts_with("DROP TABLE IF EXISTS \"doctor\""));
        assert!(log[4].starts_with("ALTER TABLE \"doctor\" DROP COLUMN"));
        assert!(log[5].starts_with("DELETE FROM \"__migrations_history\""));
        assert_eq!(log[6], "COMMIT");
    }

    #[test]
    fn test_execute_down_unapplied_conflicts() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![]);

        let result = MigrationExecutor::new(&mut driver).execute_down(&migration());
        assert!(matches!(result, Err(OrmError::MigrationConflict(_))));
    }

    #[test]
    fn test_comment_placeholders_are_skipped() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![]);

        let mut with_comment = migration();
        with_comment
            .up_statements
            .push("-- manual review required".to_string());
        MigrationExecutor::new(&mut driver)
            .execute_up(&with_comment)
            .unwrap();

        assert!(!driver.sql_log().iter().any(|sql| sql.starts_with("--")));
    }

    #[test]
    fn test_get_applied_lists_history() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![row(vec![
            ("migration_id", Value::Text("20250117093000".to_string())),
            ("migration_name", Value::Text("add_doctor".to_string())),
        ])]);

        let applied = MigrationExecutor::new(&mut driver).get_applied().unwrap();
        assert_eq!(
            applied,
            vec![AppliedMigration {
                id: "20250117093000".to_string(),
                name: "add_doctor".to_string(),
            }]
        );
    }
}
