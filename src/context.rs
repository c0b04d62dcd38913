//! The data context (unit of work).
//!
//! Owns the metadata registry, the change tracker, and one lazily opened
//! driver connection. Entities move through the context: `find`/`list`
//! materialize and attach rows, `add`/`attach`/`remove` feed the tracker,
//! `save_changes` flushes the tracked operations, and the migration entry
//! points diff and reconcile the live schema.
//!
//! `save_changes` deliberately runs without an enclosing transaction: each
//! statement commits independently, so a mid-batch failure leaves the prior
//! writes applied.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::driver::{Driver, PgDriver, Row};
use crate::entity::{Entity, RecordHandle};
use crate::error::{OrmError, OrmResult};
use crate::introspect::{SchemaReader, SchemaSnapshot};
use crate::migrate::{self, AppliedMigration, Migration, MigrationExecutor};
use crate::query::{translate_filter, translate_order, Expr, Query};
use crate::registry::SchemaRegistry;
use crate::schema::TableDescriptor;
use crate::sql;
use crate::tracking::{ChangeTracker, EntityState};
use crate::value::{Key, Value};

enum ConnectionSource {
    Env,
    Config(DatabaseConfig),
}

/// The engine's caller-facing facade.
pub struct Context {
    registry: SchemaRegistry,
    tracker: ChangeTracker,
    source: ConnectionSource,
    driver: Option<Box<dyn Driver>>,
}

impl Context {
    /// A context connecting with the given configuration on first use.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            tracker: ChangeTracker::new(),
            source: ConnectionSource::Config(config),
            driver: None,
        }
    }

    /// A context resolving its configuration from the environment on first
    /// use.
    pub fn from_env() -> Self {
        Self {
            registry: SchemaRegistry::new(),
            tracker: ChangeTracker::new(),
            source: ConnectionSource::Env,
            driver: None,
        }
    }

    /// A context over an already-open driver.
    pub fn with_driver(driver: Box<dyn Driver>) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            tracker: ChangeTracker::new(),
            source: ConnectionSource::Env,
            driver: Some(driver),
        }
    }

    /// Registers an entity's schema definition.
    pub fn register<E: Entity>(&mut self) -> OrmResult<()> {
        self.registry.register::<E>()
    }

    /// The metadata registry.
    pub fn registry(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    /// The change tracker (read-only view).
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn ensure_connected(&mut self) -> OrmResult<()> {
        if self.driver.is_some() {
            return Ok(());
        }
        let config = match &self.source {
            ConnectionSource::Config(config) => config.clone(),
            ConnectionSource::Env => DatabaseConfig::from_env()?,
        };
        debug!("opening database connection");
        self.driver = Some(Box::new(PgDriver::connect(&config)?));
        Ok(())
    }

    fn connection(&mut self) -> OrmResult<&mut dyn Driver> {
        self.ensure_connected()?;
        match self.driver.as_mut() {
            Some(driver) => Ok(&mut **driver),
            None => Err(OrmError::Connection("connection unavailable".to_string())),
        }
    }

    fn descriptor<E: Entity>(&mut self) -> OrmResult<Arc<TableDescriptor>> {
        self.registry.get_or_build(E::entity_id())
    }

    /// Loads the entity with the given key, reusing the tracked instance
    /// when the identity is already known.
    pub fn find<E: Entity>(&mut self, key: &Key) -> OrmResult<Rc<RefCell<E>>> {
        let descriptor = self.descriptor::<E>()?;
        if let Some(handle) = self.tracker.handle(E::entity_id(), key) {
            return downcast::<E>(&handle, key);
        }

        let statement = sql::select_by_primary_key(&descriptor);
        let rows = self
            .connection()?
            .query(&statement, &[Value::from(key.clone())])?;
        let row = rows.first().ok_or_else(|| {
            OrmError::NotFound(format!(
                "entity '{}' with key '{}' does not exist",
                E::entity_id(),
                key
            ))
        })?;

        self.attach_row::<E>(&descriptor, row)
    }

    /// Loads all entities matching the query, attaching each row. Tracked
    /// identities keep their existing instance.
    pub fn list<E: Entity>(&mut self, query: &Query) -> OrmResult<Vec<Rc<RefCell<E>>>> {
        let descriptor = self.descriptor::<E>()?;

        let (where_clause, params) = match &query.filter {
            Some(predicate) => {
                let (fragment, params) = translate_filter(&descriptor, predicate)?;
                (Some(fragment), params)
            }
            None => (None, Vec::new()),
        };
        let order_clause = if query.order.is_empty() {
            None
        } else {
            Some(translate_order(&descriptor, &query.order)?)
        };

        let statement = sql::select(&descriptor, where_clause.as_deref(), order_clause.as_deref());
        let rows = self.connection()?.query(&statement, &params)?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(self.attach_row::<E>(&descriptor, row)?);
        }
        Ok(result)
    }

    /// Starts tracking a new entity for insertion and returns its shared
    /// handle. The primary key may be unset when it is store-generated.
    pub fn add<E: Entity>(&mut self, entity: E) -> OrmResult<Rc<RefCell<E>>> {
        let descriptor = self.descriptor::<E>()?;
        let typed = Rc::new(RefCell::new(entity));
        self.tracker
            .mark_added(E::entity_id(), descriptor, RecordHandle::new(typed.clone()))?;
        Ok(typed)
    }

    /// Starts tracking an existing entity as Unchanged and returns its
    /// shared handle.
    pub fn attach<E: Entity>(&mut self, entity: E) -> OrmResult<Rc<RefCell<E>>> {
        let descriptor = self.descriptor::<E>()?;
        let typed = Rc::new(RefCell::new(entity));
        self.tracker
            .attach(E::entity_id(), descriptor, RecordHandle::new(typed.clone()))?;
        Ok(typed)
    }

    /// Schedules the entity with the given key for deletion.
    ///
    /// An untracked key is looked up in the store first and attached; a key
    /// that exists neither in the tracker nor in the store fails with
    /// `NotFound`.
    pub fn remove<E: Entity>(&mut self, key: &Key) -> OrmResult<()> {
        let descriptor = self.descriptor::<E>()?;
        if let Some(handle) = self.tracker.handle(E::entity_id(), key) {
            self.tracker
                .mark_deleted(E::entity_id(), descriptor, handle)?;
            return Ok(());
        }

        let statement = sql::select_by_primary_key(&descriptor);
        let rows = self
            .connection()?
            .query(&statement, &[Value::from(key.clone())])?;
        let row = rows.first().ok_or_else(|| {
            OrmError::NotFound(format!(
                "entity '{}' with key '{}' does not exist",
                E::entity_id(),
                key
            ))
        })?;

        let typed = Rc::new(RefCell::new(materialize::<E>(&descriptor, row)));
        self.tracker
            .mark_deleted(E::entity_id(), descriptor, RecordHandle::new(typed))?;
        Ok(())
    }

    /// Resolves the entity referenced by a navigation property of the given
    /// source instance. `None` when the foreign key is null or the target
    /// row no longer exists.
    pub fn find_related<E: Entity, R: Entity>(
        &mut self,
        source: &Rc<RefCell<E>>,
        navigation: &str,
    ) -> OrmResult<Option<Rc<RefCell<R>>>> {
        let descriptor = self.descriptor::<E>()?;
        let relationship = descriptor
            .relationship_by_navigation(navigation)
            .ok_or_else(|| {
                OrmError::SchemaDefinition(format!(
                    "entity '{}' has no navigation '{}'",
                    E::entity_id(),
                    navigation
                ))
            })?;
        if relationship.referenced_entity != R::entity_id() {
            return Err(OrmError::SchemaDefinition(format!(
                "navigation '{}' on entity '{}' references '{}', not '{}'",
                navigation,
                E::entity_id(),
                relationship.referenced_entity,
                R::entity_id()
            )));
        }

        let foreign_key = source.borrow().get(&relationship.property);
        if foreign_key.is_null() {
            return Ok(None);
        }
        let key = Key::from_value(&foreign_key)?;

        match self.find::<R>(&key) {
            Ok(related) => Ok(Some(related)),
            Err(OrmError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Deletes every row matching the predicate, bypassing the tracker.
    /// Returns the affected row count.
    pub fn delete_where<E: Entity>(&mut self, predicate: &Expr) -> OrmResult<u64> {
        let descriptor = self.descriptor::<E>()?;
        let (fragment, params) = translate_filter(&descriptor, predicate)?;
        let statement = sql::delete_where(&descriptor, &fragment)?;
        self.connection()?.execute(&statement, &params)
    }

    /// Runs snapshot comparison over the tracked entries.
    pub fn detect_changes(&mut self) -> usize {
        self.tracker.detect_changes()
    }

    /// Stops tracking everything.
    pub fn clear(&mut self) {
        self.tracker.clear();
    }

    /// Flushes every pending operation and returns the number of entities
    /// written. Statements execute independently, in tracker order; there is
    /// no wrapping transaction. Each entry is settled as soon as its own
    /// statement succeeds, so a retry after a mid-batch failure only re-runs
    /// the operations that did not commit.
    pub fn save_changes(&mut self) -> OrmResult<usize> {
        self.tracker.detect_changes();
        if self.tracker.is_empty() {
            return Ok(0);
        }

        self.ensure_connected()?;
        let driver = match self.driver.as_mut() {
            Some(driver) => &mut **driver,
            None => return Err(OrmError::Connection("connection unavailable".to_string())),
        };

        let affected = self.tracker.flush(|entry| {
            let descriptor = Arc::clone(entry.descriptor());
            let handle = entry.handle();
            match entry.state() {
                EntityState::Unchanged => Ok(false),
                EntityState::Added => {
                    let (statement, columns) = sql::insert(&descriptor);
                    let params: Vec<Value> =
                        columns.iter().map(|c| handle.get(&c.property)).collect();
                    let primary_key = descriptor.primary_key();
                    if primary_key.auto_increment {
                        let generated = driver.query_scalar(&statement, &params)?;
                        if !generated.is_null() {
                            handle.set(&primary_key.property, generated);
                        }
                    } else {
                        driver.execute(&statement, &params)?;
                    }
                    Ok(true)
                }
                EntityState::Modified => {
                    let (statement, columns) = sql::update(&descriptor, entry.changed())?;
                    let mut params: Vec<Value> =
                        columns.iter().map(|c| handle.get(&c.property)).collect();
                    params.push(handle.get(&descriptor.primary_key().property));
                    driver.execute(&statement, &params)?;
                    Ok(true)
                }
                EntityState::Deleted => {
                    let statement = sql::delete(&descriptor);
                    driver.execute(
                        &statement,
                        &[handle.get(&descriptor.primary_key().property)],
                    )?;
                    Ok(true)
                }
            }
        })?;

        info!(affected, "save finished");
        Ok(affected)
    }

    /// Captures the current live schema.
    pub fn introspect(&mut self) -> OrmResult<SchemaSnapshot> {
        SchemaReader::new(self.connection()?).snapshot()
    }

    /// Diffs the live schema against every registered entity and returns the
    /// reconciling migration, if any.
    pub fn generate_migration(&mut self, name: &str) -> OrmResult<Option<Migration>> {
        let target = self.registry.all_descriptors()?;
        let current = self.introspect()?;
        migrate::generate(&current, &target, name)
    }

    /// Applies a migration.
    pub fn execute_migration(&mut self, migration: &Migration) -> OrmResult<()> {
        MigrationExecutor::new(self.connection()?).execute_up(migration)
    }

    /// Reverts a migration.
    pub fn revert_migration(&mut self, migration: &Migration) -> OrmResult<()> {
        MigrationExecutor::new(self.connection()?).execute_down(migration)
    }

    /// All applied migrations in id order.
    pub fn applied_migrations(&mut self) -> OrmResult<Vec<AppliedMigration>> {
        MigrationExecutor::new(self.connection()?).get_applied()
    }

    fn attach_row<E: Entity>(
        &mut self,
        descriptor: &Arc<TableDescriptor>,
        row: &Row,
    ) -> OrmResult<Rc<RefCell<E>>> {
        let primary_key = descriptor.primary_key();
        let key = Key::from_value(row.get(&primary_key.name).unwrap_or(&Value::Null))?;

        if let Some(handle) = self.tracker.handle(E::entity_id(), &key) {
            return downcast::<E>(&handle, &key);
        }

        let typed = Rc::new(RefCell::new(materialize::<E>(descriptor, row)));
        self.tracker.attach(
            E::entity_id(),
            Arc::clone(descriptor),
            RecordHandle::new(typed.clone()),
        )?;
        Ok(typed)
    }
}

/// Best-effort row materialization: a column missing from the row or not
/// convertible by the entity is skipped rather than failing the row.
fn materialize<E: Entity>(descriptor: &TableDescriptor, row: &Row) -> E {
    let mut entity = E::default();
    for column in &descriptor.columns {
        if let Some(value) = row.get(&column.name) {
            entity.set(&column.property, value.clone());
        }
    }
    entity
}

fn downcast<E: Entity>(handle: &RecordHandle, key: &Key) -> OrmResult<Rc<RefCell<E>>> {
    handle.downcast::<E>().ok_or_else(|| {
        OrmError::TrackingConflict(format!(
            "entity '{}' with key '{}' is tracked as a different concrete type",
            E::entity_id(),
            key
        ))
    })
}
