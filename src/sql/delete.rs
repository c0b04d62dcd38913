//! DELETE statement builders.

use crate::error::{OrmError, OrmResult};
use crate::schema::TableDescriptor;

/// Generates a DELETE fixed to `WHERE "pk" = $1`.
pub fn delete(descriptor: &TableDescriptor) -> String {
    format!(
        "DELETE FROM \"{}\" WHERE \"{}\" = $1",
        descriptor.table,
        descriptor.primary_key().name
    )
}

/// Generates a DELETE with a caller-supplied WHERE fragment (without the
/// WHERE keyword).
pub fn delete_where(descriptor: &TableDescriptor, where_clause: &str) -> OrmResult<String> {
    if where_clause.trim().is_empty() {
        return Err(OrmError::SchemaDefinition(format!(
            "empty WHERE clause for delete on table '{}'",
            descriptor.table
        )));
    }
    Ok(format!(
        "DELETE FROM \"{}\" WHERE {}",
        descriptor.table, where_clause
    ))
}
