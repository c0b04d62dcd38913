//! DDL generation (CREATE TABLE / DROP TABLE) and the semantic type mapping.

use crate::error::{OrmError, OrmResult};
use crate::schema::{ColumnDescriptor, DefaultValue, SqlType, TableDescriptor};

/// Maps a column's semantic type to its PostgreSQL spelling.
///
/// Auto-increment primary keys of type `Int` become `BIGSERIAL`; plain
/// integers are `BIGINT` by convention.
pub fn data_type(column: &ColumnDescriptor) -> String {
    match column.sql_type {
        SqlType::Int => {
            if column.auto_increment && column.primary_key {
                "BIGSERIAL".to_string()
            } else {
                "BIGINT".to_string()
            }
        }
        SqlType::Decimal => match (column.precision, column.scale) {
            (Some(p), Some(s)) => format!("DECIMAL({},{})", p, s),
            (Some(p), None) => format!("DECIMAL({})", p),
            _ => "DECIMAL".to_string(),
        },
        SqlType::Float => "DOUBLE PRECISION".to_string(),
        SqlType::Varchar => match column.length {
            Some(n) => format!("VARCHAR({})", n),
            None => "VARCHAR".to_string(),
        },
        SqlType::Char => match column.length {
            Some(n) => format!("CHAR({})", n),
            None => "CHAR(1)".to_string(),
        },
        SqlType::Text => "TEXT".to_string(),
        SqlType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
        SqlType::Timestamp => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
    }
}

/// Generates a CREATE TABLE statement, one column definition per line in
/// descriptor order.
pub fn create_table(descriptor: &TableDescriptor) -> OrmResult<String> {
    let mut definitions = Vec::with_capacity(descriptor.columns.len());
    for column in &descriptor.columns {
        definitions.push(format!("    {}", column_definition(descriptor, column)?));
    }
    Ok(format!(
        "CREATE TABLE \"{}\" (\n{}\n)",
        descriptor.table,
        definitions.join(",\n")
    ))
}

/// Generates a DROP TABLE statement.
pub fn drop_table(descriptor: &TableDescriptor, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS \"{}\"", descriptor.table)
    } else {
        format!("DROP TABLE \"{}\"", descriptor.table)
    }
}

/// One column definition with its constraints in fixed order:
/// PRIMARY KEY, NOT NULL, UNIQUE, DEFAULT, REFERENCES.
pub(crate) fn column_definition(
    descriptor: &TableDescriptor,
    column: &ColumnDescriptor,
) -> OrmResult<String> {
    let mut parts = vec![format!("\"{}\" {}", column.name, data_type(column))];

    if column.primary_key {
        parts.push("PRIMARY KEY".to_string());
    }
    if column.required && !column.primary_key {
        parts.push("NOT NULL".to_string());
    }
    if column.unique {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", render_default(default, column.sql_type)));
    }

    if let Some(rel) = descriptor.relationship_for_column(&column.name) {
        match (&rel.referenced_table, &rel.referenced_column) {
            (Some(table), Some(referenced)) => {
                parts.push(format!("REFERENCES \"{}\"(\"{}\")", table, referenced));
            }
            _ => {
                return Err(OrmError::SchemaDefinition(format!(
                    "foreign key column '{}' on table '{}' references unresolved entity '{}'",
                    column.name, descriptor.table, rel.referenced_entity
                )));
            }
        }
    }

    Ok(parts.join(" "))
}

/// Renders a DEFAULT clause value. Literals for string-like types are
/// single-quoted with embedded quotes doubled; numeric literals and SQL
/// expressions are emitted verbatim.
pub(crate) fn render_default(default: &DefaultValue, sql_type: SqlType) -> String {
    match default {
        DefaultValue::Expression(expr) => expr.clone(),
        DefaultValue::Literal(value) => {
            if sql_type.is_string_like() {
                format!("'{}'", value.replace('\'', "''"))
            } else {
                value.clone()
            }
        }
    }
}
