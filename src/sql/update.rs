//! UPDATE statement builder.

use crate::error::{OrmError, OrmResult};
use crate::schema::{ColumnDescriptor, TableDescriptor};

/// Generates an UPDATE of the supplied changed columns only, keyed by the
/// primary key bound as the last placeholder.
///
/// `changed` names column properties; primary-key columns are never updated.
/// Fails with `UpdateTarget` when the changed set is empty or contains only
/// the primary key.
pub fn update<'a>(
    descriptor: &'a TableDescriptor,
    changed: &[String],
) -> OrmResult<(String, Vec<&'a ColumnDescriptor>)> {
    if changed.is_empty() {
        return Err(OrmError::UpdateTarget(format!(
            "no columns specified for update of table '{}'",
            descriptor.table
        )));
    }

    let mut columns = Vec::with_capacity(changed.len());
    for property in changed {
        let column = descriptor.column(property).ok_or_else(|| {
            OrmError::SchemaDefinition(format!(
                "unknown property '{}' on entity '{}'",
                property, descriptor.entity
            ))
        })?;
        if !column.primary_key {
            columns.push(column);
        }
    }

    if columns.is_empty() {
        return Err(OrmError::UpdateTarget(format!(
            "cannot update primary key column of table '{}'",
            descriptor.table
        )));
    }

    let set_clauses: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("\"{}\" = ${}", c.name, i + 1))
        .collect();

    let sql = format!(
        "UPDATE \"{}\" SET {} WHERE \"{}\" = ${}",
        descriptor.table,
        set_clauses.join(", "),
        descriptor.primary_key().name,
        columns.len() + 1
    );

    Ok((sql, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, SqlType};
    use pretty_assertions::assert_eq;

    fn patient() -> TableDescriptor {
        TableDescriptor::validate(
            "patient".to_string(),
            "patient".to_string(),
            vec![
                ColumnDef::new("id", SqlType::Int)
                    .primary_key()
                    .auto_increment()
                    .build(),
                ColumnDef::new("first_name", SqlType::Varchar).required().build(),
                ColumnDef::new("last_name", SqlType::Varchar).required().build(),
            ],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_update_changed_columns_only() {
        let descriptor = patient();
        let (sql, columns) = update(&descriptor, &["first_name".to_string()]).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"patient\" SET \"first_name\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].property, "first_name");
    }

    #[test]
    fn test_update_multiple_columns_keeps_order() {
        let descriptor = patient();
        let (sql, _) = update(
            &descriptor,
            &["first_name".to_string(), "last_name".to_string()],
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE \"patient\" SET \"first_name\" = $1, \"last_name\" = $2 WHERE \"id\" = $3"
        );
    }

    #[test]
    fn test_update_with_empty_set_fails() {
        let descriptor = patient();
        let result = update(&descriptor, &[]);
        assert!(matches!(result, Err(OrmError::UpdateTarget(_))));
    }

    #[test]
    fn test_update_with_only_primary_key_fails() {
        let descriptor = patient();
        let result = update(&descriptor, &["id".to_string()]);
        assert!(matches!(result, Err(OrmError::UpdateTarget(_))));
    }

    #[test]
    fn test_update_with_unknown_property_fails() {
        let descriptor = patient();
        let result = update(&descriptor, &["middle_name".to_string()]);
        assert!(matches!(result, Err(OrmError::SchemaDefinition(_))));
    }
}
