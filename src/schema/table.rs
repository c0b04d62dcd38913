//! Table descriptors and the registration builder.

use crate::error::{OrmError, OrmResult};
use crate::schema::column::{ColumnDef, ColumnDescriptor};
use crate::schema::relationship::{RelationshipDef, RelationshipDescriptor};

/// Immutable metadata for one mapped table.
///
/// Column order is insertion order and drives statement generation order.
/// Construction enforces that exactly one column is the primary key and that
/// auto-increment columns are primary keys.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    /// Entity identifier this descriptor was built for.
    pub entity: String,
    /// Database table name.
    pub table: String,
    /// Ordered column descriptors.
    pub columns: Vec<ColumnDescriptor>,
    /// Foreign-key relationships.
    pub relationships: Vec<RelationshipDescriptor>,
}

impl TableDescriptor {
    pub(crate) fn validate(
        entity: String,
        table: String,
        columns: Vec<ColumnDescriptor>,
        relationships: Vec<RelationshipDescriptor>,
    ) -> OrmResult<Self> {
        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        if pk_count == 0 {
            return Err(OrmError::SchemaDefinition(format!(
                "entity '{}' (table '{}') has no primary key column",
                entity, table
            )));
        }
        if pk_count > 1 {
            return Err(OrmError::SchemaDefinition(format!(
                "entity '{}' (table '{}') has {} primary key columns, exactly one is supported",
                entity, table, pk_count
            )));
        }
        if let Some(col) = columns.iter().find(|c| c.auto_increment && !c.primary_key) {
            return Err(OrmError::SchemaDefinition(format!(
                "column '{}' on table '{}' is auto-increment but not the primary key",
                col.name, table
            )));
        }
        Ok(Self {
            entity,
            table,
            columns,
            relationships,
        })
    }

    /// The primary-key column (guaranteed unique by construction).
    pub fn primary_key(&self) -> &ColumnDescriptor {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .expect("descriptor validated with exactly one primary key")
    }

    /// Looks up a column by its property identifier.
    pub fn column(&self, property: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Looks up a column by its database name (case-insensitive).
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The relationship owning the given foreign-key column, if any.
    pub fn relationship_for_column(&self, column: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.column == column)
    }

    /// The relationship with the given navigation name, if any.
    pub fn relationship_by_navigation(&self, navigation: &str) -> Option<&RelationshipDescriptor> {
        self.relationships
            .iter()
            .find(|r| r.navigation.as_deref() == Some(navigation))
    }
}

/// A raw, not yet validated table definition supplied at registration time.
///
/// The registry turns definitions into validated `TableDescriptor`s on first
/// use; relationship cross-references are filled in from the referenced
/// entity's definition at that point.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub(crate) table: String,
    pub(crate) columns: Vec<ColumnDef>,
    pub(crate) relationships: Vec<RelationshipDef>,
}

impl TableDef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Table name of this definition.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Primary-key column name, if one is declared.
    pub(crate) fn primary_key_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    /// Column name declared for the given property, if any.
    pub(crate) fn column_name_for(&self, property: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.property == property)
            .map(|c| c.name.as_str())
    }
}
