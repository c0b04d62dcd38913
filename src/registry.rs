//! Metadata registry
//!
//! Builds and caches one validated `TableDescriptor` per registered entity.
//! Registration stores the raw definition; the first `get_or_build` call
//! assembles and validates the descriptor. Relationship cross-references are
//! resolved in a second phase that peeks only at the referenced entity's raw
//! definition (table name, primary-key column), so two entities that
//! reference each other never force recursive construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::schema::{RelationshipDescriptor, TableDef, TableDescriptor};

/// Registry of entity schema definitions and built descriptors.
///
/// Owned by the context; registration is a one-time phase before use.
#[derive(Default)]
pub struct SchemaRegistry {
    definitions: HashMap<String, TableDef>,
    built: HashMap<String, Arc<TableDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity's schema definition.
    ///
    /// Re-registering the same entity id replaces the stored definition only
    /// while no descriptor has been built from it.
    pub fn register<E: Entity>(&mut self) -> OrmResult<()> {
        self.register_definition(E::entity_id(), E::definition())
    }

    /// Registers a definition under an explicit entity id.
    pub fn register_definition(&mut self, entity_id: &str, def: TableDef) -> OrmResult<()> {
        if self.built.contains_key(entity_id) {
            return Err(OrmError::SchemaDefinition(format!(
                "entity '{}' is already built and cannot be re-registered",
                entity_id
            )));
        }
        debug!(entity = entity_id, table = %def.table_name(), "registered entity definition");
        self.definitions.insert(entity_id.to_string(), def);
        Ok(())
    }

    /// True when the entity id has a registered definition.
    pub fn is_registered(&self, entity_id: &str) -> bool {
        self.definitions.contains_key(entity_id)
    }

    /// Returns the cached descriptor for the entity, building and validating
    /// it on first use. Subsequent calls return the same `Arc`.
    pub fn get_or_build(&mut self, entity_id: &str) -> OrmResult<Arc<TableDescriptor>> {
        if let Some(descriptor) = self.built.get(entity_id) {
            return Ok(Arc::clone(descriptor));
        }

        let def = self.definitions.get(entity_id).ok_or_else(|| {
            OrmError::SchemaDefinition(format!("entity '{}' is not registered", entity_id))
        })?;

        let descriptor = Arc::new(build_descriptor(entity_id, def, &self.definitions)?);
        debug!(
            entity = entity_id,
            table = %descriptor.table,
            columns = descriptor.columns.len(),
            "built table descriptor"
        );
        self.built
            .insert(entity_id.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Builds descriptors for every registered entity, in registration-name
    /// order (the migration generator's target model).
    pub fn all_descriptors(&mut self) -> OrmResult<Vec<Arc<TableDescriptor>>> {
        let mut ids: Vec<String> = self.definitions.keys().cloned().collect();
        ids.sort();
        ids.iter().map(|id| self.get_or_build(id)).collect()
    }
}

/// Phase one builds the columns; phase two resolves each relationship
/// against the referenced entity's raw definition without recursing.
fn build_descriptor(
    entity_id: &str,
    def: &TableDef,
    definitions: &HashMap<String, TableDef>,
) -> OrmResult<TableDescriptor> {
    let columns: Vec<_> = def.columns.iter().cloned().map(|c| c.build()).collect();

    let mut relationships = Vec::with_capacity(def.relationships.len());
    for rel in &def.relationships {
        let column = def.column_name_for(&rel.property).ok_or_else(|| {
            OrmError::SchemaDefinition(format!(
                "relationship on entity '{}' names unknown property '{}'",
                entity_id, rel.property
            ))
        })?;

        let (referenced_table, referenced_column) = match (&rel.referenced_table, &rel.referenced_column)
        {
            (Some(table), Some(col)) => (Some(table.clone()), Some(col.clone())),
            _ => match definitions.get(&rel.referenced_entity) {
                Some(target) => (
                    Some(target.table_name().to_string()),
                    target.primary_key_column().map(|c| c.to_string()),
                ),
                // Referenced entity unknown: left unresolved, surfaced by
                // DDL generation when the reference is actually needed.
                None => (None, None),
            },
        };

        relationships.push(RelationshipDescriptor {
            property: rel.property.clone(),
            column: column.to_string(),
            referenced_entity: rel.referenced_entity.clone(),
            referenced_table,
            referenced_column,
            navigation: rel.navigation.clone(),
        });
    }

    TableDescriptor::validate(
        entity_id.to_string(),
        def.table.clone(),
        columns,
        relationships,
    )
}
