//! In-memory driver double for tests.
//!
//! Records every statement it receives and replays canned responses in FIFO
//! order, so tests can assert on the exact SQL and parameters the engine
//! produced without a live database.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

use crate::driver::{Driver, Row};
use crate::entity::{Entity, Record};
use crate::error::{OrmError, OrmResult};
use crate::schema::{ColumnDef, RelationshipDef, SqlType, TableDef};
use crate::value::Value;

/// Installs the env-filtered test subscriber so `RUST_LOG=debug cargo test`
/// shows engine traces; repeated calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub(crate) struct MemoryDriver {
    statements: Vec<(String, Vec<Value>)>,
    query_results: VecDeque<Vec<Row>>,
    fail_when: Option<String>,
}

impl MemoryDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues the row set returned by the next `query` call.
    pub(crate) fn push_rows(&mut self, rows: Vec<Row>) {
        self.query_results.push_back(rows);
    }

    /// Makes every `execute` whose SQL contains the marker fail.
    pub(crate) fn fail_when(&mut self, marker: &str) {
        self.fail_when = Some(marker.to_string());
    }

    /// Lets subsequent statements succeed again.
    pub(crate) fn clear_failures(&mut self) {
        self.fail_when = None;
    }

    /// Every statement seen so far, in order.
    pub(crate) fn sql_log(&self) -> Vec<&str> {
        self.statements.iter().map(|(sql, _)| sql.as_str()).collect()
    }

    /// Parameters bound to the statement at the given log position.
    pub(crate) fn params_at(&self, index: usize) -> &[Value] {
        &self.statements[index].1
    }
}

impl Driver for MemoryDriver {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.statements.push((sql.to_string(), params.to_vec()));
        match &self.fail_when {
            Some(marker) if sql.contains(marker.as_str()) => {
                Err(OrmError::store(format!("forced failure on: {}", sql)))
            }
            _ => Ok(1),
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.statements.push((sql.to_string(), params.to_vec()));
        Ok(self.query_results.pop_front().unwrap_or_default())
    }

    fn query_scalar(&mut self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        let rows = self.query(sql, params)?;
        Ok(rows
            .first()
            .and_then(|row| row.columns().first().map(|(_, v)| v.clone()))
            .unwrap_or(Value::Null))
    }

    fn begin(&mut self) -> OrmResult<()> {
        self.statements.push(("BEGIN".to_string(), Vec::new()));
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.statements.push(("COMMIT".to_string(), Vec::new()));
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.statements.push(("ROLLBACK".to_string(), Vec::new()));
        Ok(())
    }
}

/// Shorthand for building a canned row.
pub(crate) fn row(columns: Vec<(&str, Value)>) -> Row {
    Row::new(
        columns
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

/// A cloneable wrapper so a test can hand the driver to a context and still
/// inspect the statement log afterwards.
#[derive(Clone, Default)]
pub(crate) struct SharedDriver(pub(crate) Rc<RefCell<MemoryDriver>>);

impl SharedDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Driver for SharedDriver {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.0.borrow_mut().execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.0.borrow_mut().query(sql, params)
    }

    fn query_scalar(&mut self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        self.0.borrow_mut().query_scalar(sql, params)
    }

    fn begin(&mut self) -> OrmResult<()> {
        self.0.borrow_mut().begin()
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.0.borrow_mut().commit()
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.0.borrow_mut().rollback()
    }
}

/// Minimal patient entity used across context tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Patient {
    pub(crate) id: Option<i64>,
    pub(crate) first_name: String,
    pub(crate) doctor_id: Option<i64>,
}

impl Record for Patient {
    fn get(&self, property: &str) -> Value {
        match property {
            "id" => self.id.into(),
            "first_name" => self.first_name.as_str().into(),
            "doctor_id" => self.doctor_id.into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "id" => self.id = value.as_int(),
            "first_name" => {
                if let Some(v) = value.as_text() {
                    self.first_name = v.to_string();
                }
            }
            "doctor_id" => self.doctor_id = value.as_int(),
            _ => {}
        }
    }
}

impl Entity for Patient {
    fn entity_id() -> &'static str {
        "patient"
    }

    fn definition() -> TableDef {
        TableDef::new("patient")
            .column(
                ColumnDef::new("id", SqlType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDef::new("first_name", SqlType::Varchar).required())
            .column(ColumnDef::new("doctor_id", SqlType::Int))
            .relationship(RelationshipDef::new("doctor_id", "doctor").navigation("doctor"))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Doctor {
    pub(crate) id: Option<i64>,
    pub(crate) last_name: String,
}

impl Record for Doctor {
    fn get(&self, property: &str) -> Value {
        match property {
            "id" => self.id.into(),
            "last_name" => self.last_name.as_str().into(),
            _ => Value::Null,
        }
    }

    fn set(&mut self, property: &str, value: Value) {
        match property {
            "id" => self.id = value.as_int(),
            "last_name" => {
                if let Some(v) = value.as_text() {
                    self.last_name = v.to_string();
                }
            }
            _ => {}
        }
    }
}

impl Entity for Doctor {
    fn entity_id() -> &'static str {
        "doctor"
    }

    fn definition() -> TableDef {
        TableDef::new("doctor")
            .column(
                ColumnDef::new("id", SqlType::Int)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDef::new("last_name", SqlType::Varchar).required())
    }
}
