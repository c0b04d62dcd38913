//! Migration generation (schema diff).
//!
//! Pure function from (live snapshot, registered model) to an optional
//! migration. Two asymmetries are inherent to diffing against a live store
//! and deliberately kept: a table dropped from the model cannot be recreated
//! on the down path, and a column missing from the model is only dropped
//! when reverting, never on the way up. Both sides emit comment placeholders
//! for the half they cannot express; placeholders are stripped from the
//! final statement lists.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::OrmResult;
use crate::introspect::{ColumnSnapshot, SchemaSnapshot, TableSnapshot};
use crate::migrate::Migration;
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::sql;
use crate::sql::ddl::{column_definition, render_default};

/// Diffs the live snapshot against the target model and returns the
/// migration that reconciles them, or `None` when nothing differs.
pub fn generate(
    current: &SchemaSnapshot,
    target: &[Arc<TableDescriptor>],
    name: &str,
) -> OrmResult<Option<Migration>> {
    let mut up = Vec::new();
    let mut down = Vec::new();

    for descriptor in target {
        match current.table(&descriptor.table) {
            None => {
                debug!(table = %descriptor.table, "table missing from live schema");
                up.push(format!("{};", sql::create_table(descriptor)?));
                down.push(format!("DROP TABLE IF EXISTS \"{}\";", descriptor.table));
            }
            Some(live) => diff_table(descriptor, live, &mut up, &mut down)?,
        }
    }

    let mapped: HashSet<&str> = target.iter().map(|d| d.table.as_str()).collect();
    for live in &current.tables {
        if !mapped.contains(live.name.as_str()) {
            up.push(format!("DROP TABLE IF EXISTS \"{}\";", live.name));
            down.push(format!(
                "-- table \"{}\" was dropped and cannot be recreated from the live schema",
                live.name
            ));
        }
    }

    let up: Vec<String> = up.into_iter().filter(|s| !is_placeholder(s)).collect();
    let down: Vec<String> = down.into_iter().filter(|s| !is_placeholder(s)).collect();

    if up.is_empty() && down.is_empty() {
        debug!("schemas match, no migration generated");
        return Ok(None);
    }

    let migration = Migration {
        id: Utc::now().format("%Y%m%d%H%M%S").to_string(),
        name: name.to_string(),
        up_statements: up,
        down_statements: down,
    };
    info!(id = %migration.id, name = %migration.name, "migration generated");
    Ok(Some(migration))
}

fn is_placeholder(statement: &str) -> bool {
    statement.trim_start().starts_with("--")
}

fn diff_table(
    descriptor: &TableDescriptor,
    live: &TableSnapshot,
    up: &mut Vec<String>,
    down: &mut Vec<String>,
) -> OrmResult<()> {
    for column in &descriptor.columns {
        match live.column(&column.name) {
            None => {
                up.push(format!(
                    "ALTER TABLE \"{}\" ADD COLUMN {};",
                    descriptor.table,
                    column_definition(descriptor, column)?
                ));
                down.push(format!(
                    "ALTER TABLE \"{}\" DROP COLUMN IF EXISTS \"{}\";",
                    descriptor.table, column.name
                ));
            }
            Some(live_column) => diff_column(descriptor, column, live_column, up, down),
        }
    }

    for live_column in &live.columns {
        if descriptor.column_by_name(&live_column.name).is_none() {
            up.push(format!(
                "-- column \"{}\" on table \"{}\" is unmapped; drop it manually if intended",
                live_column.name, descriptor.table
            ));
            down.push(format!(
                "ALTER TABLE \"{}\" DROP COLUMN IF EXISTS \"{}\";",
                descriptor.table, live_column.name
            ));
        }
    }

    Ok(())
}

fn diff_column(
    descriptor: &TableDescriptor,
    column: &ColumnDescriptor,
    live: &ColumnSnapshot,
    up: &mut Vec<String>,
    down: &mut Vec<String>,
) {
    let target_type = sql::data_type(column);
    if base_type(&target_type) != base_type(&live.data_type) {
        up.push(format!(
            "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" TYPE {};",
            descriptor.table, column.name, target_type
        ));
        down.push(format!(
            "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" TYPE {};",
            descriptor.table, column.name, live.data_type
        ));
    }

    let target_not_null = column.required || column.primary_key;
    let live_not_null = !live.nullable;
    if target_not_null != live_not_null {
        let (up_action, down_action) = if target_not_null {
            ("SET NOT NULL", "DROP NOT NULL")
        } else {
            ("DROP NOT NULL", "SET NOT NULL")
        };
        up.push(format!(
            "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" {};",
            descriptor.table, column.name, up_action
        ));
        down.push(format!(
            "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" {};",
            descriptor.table, column.name, down_action
        ));
    }

    // Sequence-backed defaults on auto-increment keys never match the model
    // rendering, so they are excluded from the comparison.
    if column.auto_increment && column.primary_key {
        return;
    }

    let target_default = column
        .default
        .as_ref()
        .map(|d| render_default(d, column.sql_type));
    let live_default = live.default_value.as_deref().map(strip_cast);

    if !defaults_match(target_default.as_deref(), live_default.as_deref()) {
        match (&target_default, &live_default) {
            (Some(target), _) => {
                up.push(format!(
                    "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" SET DEFAULT {};",
                    descriptor.table, column.name, target
                ));
            }
            (None, Some(_)) => {
                up.push(format!(
                    "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" DROP DEFAULT;",
                    descriptor.table, column.name
                ));
            }
            (None, None) => {}
        }
        match (&target_default, &live_default) {
            (_, Some(live)) => {
                down.push(format!(
                    "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" SET DEFAULT {};",
                    descriptor.table, column.name, live
                ));
            }
            (Some(_), None) => {
                down.push(format!(
                    "ALTER TABLE \"{}\" ALTER COLUMN \"{}\" DROP DEFAULT;",
                    descriptor.table, column.name
                ));
            }
            (None, None) => {}
        }
    }
}

/// Folds a rendered type down to the base name the diff compares:
/// length/precision modifiers are ignored and serial storage types are
/// equivalent to their backing integer type.
fn base_type(data_type: &str) -> String {
    let upper = data_type.to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim().to_string();
    match base.as_str() {
        "BIGSERIAL" | "INT8" => "BIGINT".to_string(),
        "SERIAL" | "INT" | "INT4" => "INTEGER".to_string(),
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP".to_string(),
        "TIMESTAMPTZ" => "TIMESTAMP WITH TIME ZONE".to_string(),
        "CHARACTER VARYING" => "VARCHAR".to_string(),
        "CHARACTER" | "BPCHAR" => "CHAR".to_string(),
        "NUMERIC" => "DECIMAL".to_string(),
        _ => base,
    }
}

/// Drops the `::type` cast the catalog appends to stored defaults.
fn strip_cast(default: &str) -> String {
    match default.find("::") {
        Some(index) => default[..index].trim().to_string(),
        None => default.trim().to_string(),
    }
}

fn defaults_match(target: Option<&str>, live: Option<&str>) -> bool {
    match (target, live) {
        (Some(t), Some(l)) => t.eq_ignore_ascii_case(l),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ColumnSnapshot, TableSnapshot};
    use crate::schema::{ColumnDef, SqlType, TableDescriptor};
    use pretty_assertions::assert_eq;

    fn doctor() -> Arc<TableDescriptor> {
        Arc::new(
            TableDescriptor::validate(
                "doctor".to_string(),
                "doctor".to_string(),
                vec![
                    ColumnDef::new("id", SqlType::Int)
                        .primary_key()
                        .auto_increment()
                        .build(),
                    ColumnDef::new("last_name", SqlType::Varchar)
                        .length(100)
                        .required()
                        .build(),
                ],
                vec![],
            )
            .unwrap(),
        )
    }

    fn live_doctor() -> TableSnapshot {
        TableSnapshot {
            name: "doctor".to_string(),
            columns: vec![
                ColumnSnapshot {
                    name: "id".to_string(),
                    data_type: "BIGINT".to_string(),
                    nullable: false,
                    default_value: Some("nextval('doctor_id_seq'::regclass)".to_string()),
                    is_primary_key: true,
                    is_unique: false,
                    auto_increment: true,
                    references: None,
                },
                ColumnSnapshot {
                    name: "last_name".to_string(),
                    data_type: "VARCHAR(100)".to_string(),
                    nullable: false,
                    default_value: None,
                    is_primary_key: false,
                    is_unique: false,
                    auto_increment: false,
                    references: None,
                },
            ],
        }
    }

    fn empty_snapshot() -> SchemaSnapshot {
        SchemaSnapshot { tables: vec![] }
    }

    #[test]
    fn test_new_table_creates_up_and_drops_down() {
        let migration = generate(&empty_snapshot(), &[doctor()], "init")
            .unwrap()
            .unwrap();
        assert!(migration.up_statements[0].starts_with("CREATE TABLE \"doctor\" ("));
        assert_eq!(
            migration.down_statements[0],
            "DROP TABLE IF EXISTS \"doctor\";"
        );
        assert_eq!(migration.name, "init");
        assert_eq!(migration.id.len(), 14);
    }

    #[test]
    fn test_matching_schema_yields_none() {
        let snapshot = SchemaSnapshot {
            tables: vec![live_doctor()],
        };
        assert_eq!(generate(&snapshot, &[doctor()], "noop").unwrap(), None);
        // Purity: an immediate second run sees the same answer.
        assert_eq!(generate(&snapshot, &[doctor()], "noop").unwrap(), None);
    }

    #[test]
    fn test_serial_and_length_differences_are_compatible() {
        let mut live = live_doctor();
        live.columns[1].data_type = "VARCHAR(255)".to_string();
        let snapshot = SchemaSnapshot { tables: vec![live] };
        assert_eq!(generate(&snapshot, &[doctor()], "noop").unwrap(), None);
    }

    #[test]
    fn test_added_column_alters_both_ways() {
        let mut target = (*doctor()).clone();
        target
            .columns
            .push(ColumnDef::new("title", SqlType::Varchar).build());
        let snapshot = SchemaSnapshot {
            tables: vec![live_doctor()],
        };
        let migration = generate(&snapshot, &[Arc::new(target)], "add_title")
            .unwrap()
            .unwrap();
        assert_eq!(
            migration.up_statements,
            vec!["ALTER TABLE \"doctor\" ADD COLUMN \"title\" VARCHAR;".to_string()]
        );
        assert_eq!(
            migration.down_statements,
            vec!["ALTER TABLE \"doctor\" DROP COLUMN IF EXISTS \"title\";".to_string()]
        );
    }

    #[test]
    fn test_unmapped_column_only_drops_on_down() {
        let mut live = live_doctor();
        live.columns.push(ColumnSnapshot {
            name: "legacy_code".to_string(),
            data_type: "TEXT".to_string(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
            is_unique: false,
            auto_increment: false,
            references: None,
        });
        let snapshot = SchemaSnapshot { tables: vec![live] };
        let migration = generate(&snapshot, &[doctor()], "cleanup")
            .unwrap()
            .unwrap();
        assert!(migration.up_statements.is_empty());
        assert_eq!(
            migration.down_statements,
            vec!["ALTER TABLE \"doctor\" DROP COLUMN IF EXISTS \"legacy_code\";".to_string()]
        );
    }

    #[test]
    fn test_dropped_table_drops_on_up_only() {
        let snapshot = SchemaSnapshot {
            tables: vec![live_doctor()],
        };
        let migration = generate(&snapshot, &[], "drop_doctor").unwrap().unwrap();
        assert_eq!(
            migration.up_statements,
            vec!["DROP TABLE IF EXISTS \"doctor\";".to_string()]
        );
        assert!(migration.down_statements.is_empty());
    }

    #[test]
    fn test_nullability_change_emits_matched_pair() {
        let mut live = live_doctor();
        live.columns[1].nullable = true;
        let snapshot = SchemaSnapshot { tables: vec![live] };
        let migration = generate(&snapshot, &[doctor()], "tighten")
            .unwrap()
            .unwrap();
        assert_eq!(
            migration.up_statements,
            vec!["ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" SET NOT NULL;".to_string()]
        );
        assert_eq!(
            migration.down_statements,
            vec!["ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" DROP NOT NULL;".to_string()]
        );
    }

    #[test]
    fn test_default_change_emits_matched_pair() {
        let mut target = (*doctor()).clone();
        target.columns[1] = ColumnDef::new("last_name", SqlType::Varchar)
            .length(100)
            .required()
            .default_value("unknown")
            .build();
        let snapshot = SchemaSnapshot {
            tables: vec![live_doctor()],
        };
        let migration = generate(&snapshot, &[Arc::new(target)], "default")
            .unwrap()
            .unwrap();
        assert_eq!(
            migration.up_statements,
            vec![
                "ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" SET DEFAULT 'unknown';"
                    .to_string()
            ]
        );
        assert_eq!(
            migration.down_statements,
            vec!["ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" DROP DEFAULT;".to_string()]
        );
    }

    #[test]
    fn test_auto_increment_default_is_not_compared() {
        // The live id column carries a nextval default the model never
        // renders; no default statements may come out of that.
        let snapshot = SchemaSnapshot {
            tables: vec![live_doctor()],
        };
        assert_eq!(generate(&snapshot, &[doctor()], "noop").unwrap(), None);
    }

    #[test]
    fn test_type_change_emits_matched_pair() {
        let mut live = live_doctor();
        live.columns[1].data_type = "TEXT".to_string();
        let snapshot = SchemaSnapshot { tables: vec![live] };
        let migration = generate(&snapshot, &[doctor()], "retype")
            .unwrap()
            .unwrap();
        assert_eq!(
            migration.up_statements,
            vec!["ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" TYPE VARCHAR(100);".to_string()]
        );
        assert_eq!(
            migration.down_statements,
            vec!["ALTER TABLE \"doctor\" ALTER COLUMN \"last_name\" TYPE TEXT;".to_string()]
        );
    }
}
