//! INSERT statement builder.

use crate::schema::{ColumnDescriptor, TableDescriptor};

/// Generates an INSERT binding every column in descriptor order, except an
/// auto-increment primary key which the store generates. When the key is
/// auto-increment the statement returns it via RETURNING; callers execute it
/// as a scalar query instead of a row-count statement.
///
/// Returns the statement and the columns to bind, in placeholder order.
pub fn insert(descriptor: &TableDescriptor) -> (String, Vec<&ColumnDescriptor>) {
    let auto_pk = descriptor.primary_key().auto_increment;

    let columns: Vec<&ColumnDescriptor> = descriptor
        .columns
        .iter()
        .filter(|c| !(auto_pk && c.primary_key))
        .collect();

    let names: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    let mut sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        descriptor.table,
        names.join(", "),
        placeholders.join(", ")
    );

    if auto_pk {
        sql.push_str(&format!(" RETURNING \"{}\"", descriptor.primary_key().name));
    }

    (sql, columns)
}
