//! Relationship descriptors (single-column foreign keys).

/// Immutable metadata for one foreign-key relationship.
///
/// The referenced table/column names are resolved by the registry from the
/// referenced entity's definition when not given explicitly; they stay
/// `None` when the referenced entity is unknown, and DDL generation reports
/// that as a schema definition error.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    /// Property identifier of the foreign-key column on the owning entity.
    pub property: String,
    /// Column name of the foreign key on the owning table.
    pub column: String,
    /// Entity identifier of the referenced entity.
    pub referenced_entity: String,
    /// Referenced table name, once resolved.
    pub referenced_table: Option<String>,
    /// Referenced column name (the referenced entity's primary key unless
    /// given explicitly), once resolved.
    pub referenced_column: Option<String>,
    /// Optional navigation name for related-entity lookup.
    pub navigation: Option<String>,
}

impl RelationshipDescriptor {
    /// True once both referenced names are known.
    pub fn is_resolved(&self) -> bool {
        self.referenced_table.is_some() && self.referenced_column.is_some()
    }
}

/// Builder for a relationship definition.
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub(crate) property: String,
    pub(crate) referenced_entity: String,
    pub(crate) referenced_table: Option<String>,
    pub(crate) referenced_column: Option<String>,
    pub(crate) navigation: Option<String>,
}

impl RelationshipDef {
    /// Declares that the column behind `property` references the primary key
    /// of `referenced_entity`.
    pub fn new(property: impl Into<String>, referenced_entity: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            referenced_entity: referenced_entity.into(),
            referenced_table: None,
            referenced_column: None,
            navigation: None,
        }
    }

    /// Overrides the referenced table/column names instead of resolving them
    /// from the referenced entity's definition.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.referenced_table = Some(table.into());
        self.referenced_column = Some(column.into());
        self
    }

    /// Names the navigation used by related-entity lookup.
    pub fn navigation(mut self, name: impl Into<String>) -> Self {
        self.navigation = Some(name.into());
        self
    }
}
