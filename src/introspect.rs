//! Schema introspection module
//!
//! Reads the live database catalog into an immutable snapshot the migration
//! generator can diff against the registered model. Only the `public` schema
//! is inspected and the engine's own migration-history table is excluded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::Driver;
use crate::error::OrmResult;
use crate::value::Value;

/// Complete schema snapshot at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSnapshot>,
}

impl SchemaSnapshot {
    /// The snapshot of the named table, if present.
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// One live table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
}

impl TableSnapshot {
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One live column with its normalized type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub name: String,
    /// Canonical rendering of the catalog type, e.g. `VARCHAR(100)`,
    /// `DECIMAL(10,2)`, `BIGINT`.
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    /// Sequence-backed default (`nextval(...)`), i.e. SERIAL-family storage.
    pub auto_increment: bool,
    /// Foreign-key target, when resolvable.
    pub references: Option<ForeignKeyTarget>,
}

/// Referenced table/column of a foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyTarget {
    pub table: String,
    pub column: String,
}

/// Reads schema snapshots from a live store.
pub struct SchemaReader<'a> {
    driver: &'a mut dyn Driver,
}

impl<'a> SchemaReader<'a> {
    pub fn new(driver: &'a mut dyn Driver) -> Self {
        Self { driver }
    }

    /// Captures the current schema of the `public` namespace.
    pub fn snapshot(&mut self) -> OrmResult<SchemaSnapshot> {
        let table_rows = self.driver.query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             AND table_name NOT LIKE '__migrations%' ORDER BY table_name",
            &[],
        )?;

        let names: Vec<String> = table_rows
            .iter()
            .filter_map(|row| row.text("table_name").map(str::to_string))
            .collect();
        debug!(tables = names.len(), "captured table list");

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = self.read_columns(&name)?;
            tables.push(TableSnapshot { name, columns });
        }

        Ok(SchemaSnapshot { tables })
    }

    fn read_columns(&mut self, table: &str) -> OrmResult<Vec<ColumnSnapshot>> {
        let query = "\
            SELECT \
                c.column_name, \
                c.data_type, \
                c.character_maximum_length, \
                c.numeric_precision, \
                c.numeric_scale, \
                c.is_nullable, \
                c.column_default, \
                COALESCE( \
                    (SELECT true FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                        ON tc.constraint_name = kcu.constraint_name \
                        AND tc.table_schema = kcu.table_schema \
                     WHERE tc.constraint_type = 'PRIMARY KEY' \
                        AND tc.table_schema = c.table_schema \
                        AND tc.table_name = c.table_name \
                        AND kcu.column_name = c.column_name \
                     LIMIT 1), \
                    false \
                ) AS is_primary_key, \
                COALESCE( \
                    (SELECT true FROM information_schema.table_constraints tc \
                     JOIN information_schema.key_column_usage kcu \
                        ON tc.constraint_name = kcu.constraint_name \
                        AND tc.table_schema = kcu.table_schema \
                     WHERE tc.constraint_type = 'UNIQUE' \
                        AND tc.table_schema = c.table_schema \
                        AND tc.table_name = c.table_name \
                        AND kcu.column_name = c.column_name \
                     LIMIT 1), \
                    false \
                ) AS is_unique \
            FROM information_schema.columns c \
            WHERE c.table_schema = 'public' AND c.table_name = $1 \
            ORDER BY c.ordinal_position";

        let rows = self
            .driver
            .query(query, &[Value::Text(table.to_string())])?;
        let foreign_keys = self.read_foreign_keys(table)?;

        let columns = rows
            .iter()
            .filter_map(|row| {
                let name = row.text("column_name")?.to_string();
                let default_value = row.text("column_default").map(str::to_string);
                let references = foreign_keys
                    .iter()
                    .find(|(column, _)| *column == name)
                    .map(|(_, target)| target.clone());
                Some(ColumnSnapshot {
                    data_type: normalize_type(
                        row.text("data_type").unwrap_or_default(),
                        row.int("character_maximum_length"),
                        row.int("numeric_precision"),
                        row.int("numeric_scale"),
                    ),
                    nullable: row.text("is_nullable") == Some("YES"),
                    auto_increment: default_value
                        .as_deref()
                        .is_some_and(|d| d.starts_with("nextval(")),
                    default_value,
                    is_primary_key: row.bool("is_primary_key").unwrap_or(false),
                    is_unique: row.bool("is_unique").unwrap_or(false),
                    references,
                    name,
                })
            })
            .collect();

        Ok(columns)
    }

    fn read_foreign_keys(&mut self, table: &str) -> OrmResult<Vec<(String, ForeignKeyTarget)>> {
        let query = "\
            SELECT kcu.column_name, \
                   ccu.table_name AS referenced_table, \
                   ccu.column_name AS referenced_column \
            FROM information_schema.table_constraints tc \
            JOIN information_schema.key_column_usage kcu \
                ON tc.constraint_name = kcu.constraint_name \
                AND tc.table_schema = kcu.table_schema \
            JOIN information_schema.constraint_column_usage ccu \
                ON tc.constraint_name = ccu.constraint_name \
                AND tc.table_schema = ccu.constraint_schema \
            WHERE tc.constraint_type = 'FOREIGN KEY' \
                AND tc.table_schema = 'public' AND tc.table_name = $1";

        let rows = self
            .driver
            .query(query, &[Value::Text(table.to_string())])?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some((
                    row.text("column_name")?.to_string(),
                    ForeignKeyTarget {
                        table: row.text("referenced_table")?.to_string(),
                        column: row.text("referenced_column")?.to_string(),
                    },
                ))
            })
            .collect())
    }
}

/// Folds a catalog type name plus modifiers into the canonical rendering the
/// diff algorithm compares against generated DDL.
fn normalize_type(
    data_type: &str,
    max_length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    match data_type.to_ascii_lowercase().as_str() {
        "bigint" => "BIGINT".to_string(),
        "integer" => "INTEGER".to_string(),
        "smallint" => "SMALLINT".to_string(),
        "character varying" => match max_length {
            Some(n) => format!("VARCHAR({})", n),
            None => "VARCHAR".to_string(),
        },
        "character" => match max_length {
            Some(n) => format!("CHAR({})", n),
            None => "CHAR".to_string(),
        },
        "text" => "TEXT".to_string(),
        "numeric" => match (precision, scale) {
            (Some(p), Some(s)) if s != 0 => format!("DECIMAL({},{})", p, s),
            (Some(p), _) => format!("DECIMAL({})", p),
            _ => "DECIMAL".to_string(),
        },
        "double precision" => "DOUBLE PRECISION".to_string(),
        "real" => "REAL".to_string(),
        "boolean" => "BOOLEAN".to_string(),
        "timestamp without time zone" => "TIMESTAMP".to_string(),
        "timestamp with time zone" => "TIMESTAMP WITH TIME ZONE".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{row, MemoryDriver};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_varchar_with_length() {
        assert_eq!(
            normalize_type("character varying", Some(100), None, None),
            "VARCHAR(100)"
        );
        assert_eq!(normalize_type("character varying", None, None, None), "VARCHAR");
    }

    #[test]
    fn test_normalize_numeric_variants() {
        assert_eq!(normalize_type("numeric", None, Some(10), Some(2)), "DECIMAL(10,2)");
        assert_eq!(normalize_type("numeric", None, Some(10), Some(0)), "DECIMAL(10)");
        assert_eq!(normalize_type("numeric", None, None, None), "DECIMAL");
    }

    #[test]
    fn test_normalize_timestamps() {
        assert_eq!(
            normalize_type("timestamp without time zone", None, None, None),
            "TIMESTAMP"
        );
        assert_eq!(
            normalize_type("timestamp with time zone", None, None, None),
            "TIMESTAMP WITH TIME ZONE"
        );
    }

    #[test]
    fn test_snapshot_reads_tables_and_columns() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![row(vec![(
            "table_name",
            Value::Text("patient".to_string()),
        )])]);
        driver.push_rows(vec![
            row(vec![
                ("column_name", Value::Text("id".to_string())),
                ("data_type", Value::Text("bigint".to_string())),
                ("character_maximum_length", Value::Null),
                ("numeric_precision", Value::Int(64)),
                ("numeric_scale", Value::Int(0)),
                ("is_nullable", Value::Text("NO".to_string())),
                (
                    "column_default",
                    Value::Text("nextval('patient_id_seq'::regclass)".to_string()),
                ),
                ("is_primary_key", Value::Bool(true)),
                ("is_unique", Value::Bool(false)),
            ]),
            row(vec![
                ("column_name", Value::Text("first_name".to_string())),
                ("data_type", Value::Text("character varying".to_string())),
                ("character_maximum_length", Value::Int(100)),
                ("numeric_precision", Value::Null),
                ("numeric_scale", Value::Null),
                ("is_nullable", Value::Text("YES".to_string())),
                ("column_default", Value::Null),
                ("is_primary_key", Value::Bool(false)),
                ("is_unique", Value::Bool(false)),
            ]),
        ]);
        // No foreign keys on patient.
        driver.push_rows(vec![]);

        let snapshot = SchemaReader::new(&mut driver).snapshot().unwrap();
        assert_eq!(snapshot.tables.len(), 1);

        let table = snapshot.table("patient").unwrap();
        let id = table.column("id").unwrap();
        assert!(id.is_primary_key);
        assert!(id.auto_increment);
        assert_eq!(id.data_type, "BIGINT");

        let first_name = table.column("first_name").unwrap();
        assert_eq!(first_name.data_type, "VARCHAR(100)");
        assert!(first_name.nullable);
        assert!(!first_name.auto_increment);
    }

    #[test]
    fn test_snapshot_resolves_foreign_keys() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![row(vec![(
            "table_name",
            Value::Text("medication".to_string()),
        )])]);
        driver.push_rows(vec![row(vec![
            ("column_name", Value::Text("patient_id".to_string())),
            ("data_type", Value::Text("bigint".to_string())),
            ("character_maximum_length", Value::Null),
            ("numeric_precision", Value::Int(64)),
            ("numeric_scale", Value::Int(0)),
            ("is_nullable", Value::Text("NO".to_string())),
            ("column_default", Value::Null),
            ("is_primary_key", Value::Bool(false)),
            ("is_unique", Value::Bool(false)),
        ])]);
        driver.push_rows(vec![row(vec![
            ("column_name", Value::Text("patient_id".to_string())),
            ("referenced_table", Value::Text("patient".to_string())),
            ("referenced_column", Value::Text("id".to_string())),
        ])]);

        let snapshot = SchemaReader::new(&mut driver).snapshot().unwrap();
        let column = snapshot.table("medication").unwrap().column("patient_id").unwrap();
        assert_eq!(
            column.references,
            Some(ForeignKeyTarget {
                table: "patient".to_string(),
                column: "id".to_string(),
            })
        );
    }

    #[test]
    fn test_snapshot_excludes_history_table() {
        let mut driver = MemoryDriver::new();
        driver.push_rows(vec![]);
        let snapshot = SchemaReader::new(&mut driver).snapshot().unwrap();
        assert!(snapshot.tables.is_empty());
        assert!(driver.sql_log()[0].contains("NOT LIKE '__migrations%'"));
    }
}
