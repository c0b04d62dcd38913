//! Store driver abstraction
//!
//! Everything above this layer speaks SQL text plus `Value` parameters and
//! consumes name/value rows. The trait keeps the engine testable with an
//! in-memory double and keeps the postgres adapter in one place.

mod pg;

pub use pg::PgDriver;

use crate::error::OrmResult;
use crate::value::Value;

/// One result row: column name/value pairs in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// The value of the named column (case-insensitive), if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Synchronous statement execution against the store.
///
/// Transactions are driver-level state: `begin` opens one on the session and
/// `commit`/`rollback` close it. Callers own the pairing.
pub trait Driver {
    /// Executes a statement and returns the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64>;

    /// Runs a query and returns all rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Runs a query expected to produce a single value (first column of the
    /// first row), `Null` when no row comes back.
    fn query_scalar(&mut self, sql: &str, params: &[Value]) -> OrmResult<Value>;

    fn begin(&mut self) -> OrmResult<()>;

    fn commit(&mut self) -> OrmResult<()>;

    fn rollback(&mut self) -> OrmResult<()>;
}
