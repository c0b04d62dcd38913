//! SELECT statement builders.

use crate::schema::TableDescriptor;

/// Generates a SELECT with the explicit, table-qualified column list in
/// descriptor order. WHERE/ORDER BY fragments are appended verbatim, without
/// their keywords.
pub fn select(
    descriptor: &TableDescriptor,
    where_clause: Option<&str>,
    order_by_clause: Option<&str>,
) -> String {
    let columns: Vec<String> = descriptor
        .columns
        .iter()
        .map(|c| format!("\"{}\".\"{}\"", descriptor.table, c.name))
        .collect();

    let mut sql = format!(
        "SELECT {} FROM \"{}\"",
        columns.join(", "),
        descriptor.table
    );

    if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    if let Some(clause) = order_by_clause.filter(|c| !c.trim().is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(clause);
    }

    sql
}

/// SELECT fixed to `WHERE "pk" = $1`.
pub fn select_by_primary_key(descriptor: &TableDescriptor) -> String {
    let where_clause = format!("\"{}\" = $1", descriptor.primary_key().name);
    select(descriptor, Some(&where_clause), None)
}

/// SELECT of all rows with optional ordering.
pub fn select_all(descriptor: &TableDescriptor, order_by_clause: Option<&str>) -> String {
    select(descriptor, None, order_by_clause)
}
