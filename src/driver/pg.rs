//! PostgreSQL driver adapter.
//!
//! Wraps a blocking `postgres::Client`. Parameters are bound through a
//! `ToSql` implementation on `Value` that defers to the wire encoding of the
//! wrapped primitive; result cells are decoded back into `Value`s by
//! inspecting the column type.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::driver::{Driver, Row};
use crate::error::OrmResult;
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => {
                // Narrow for smaller integer columns; the wire format is
                // sized by the column type, not by our representation.
                if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else if *ty == Type::INT2 {
                    (*v as i16).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Text(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Type mismatches surface from the server; `Null` has to be
        // bindable against any column type.
        true
    }

    to_sql_checked!();
}

/// Blocking PostgreSQL driver.
pub struct PgDriver {
    client: Client,
}

impl PgDriver {
    /// Connects using the given configuration.
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        debug!(host = %config.host, database = %config.database, "connecting to postgres");
        let client = Client::connect(&config.connection_string(), NoTls)?;
        Ok(Self { client })
    }

    /// Connects using a raw connection string.
    pub fn connect_raw(params: &str) -> OrmResult<Self> {
        let client = Client::connect(params, NoTls)?;
        Ok(Self { client })
    }

    fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
        params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

impl Driver for PgDriver {
    fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        debug!(sql, params = params.len(), "executing statement");
        let count = self.client.execute(sql, &Self::bind(params))?;
        Ok(count)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        debug!(sql, params = params.len(), "running query");
        let rows = self.client.query(sql, &Self::bind(params))?;
        rows.iter().map(convert_row).collect()
    }

    fn query_scalar(&mut self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        let rows = self.query(sql, params)?;
        Ok(rows
            .first()
            .and_then(|row| row.columns().first().map(|(_, v)| v.clone()))
            .unwrap_or(Value::Null))
    }

    fn begin(&mut self) -> OrmResult<()> {
        self.client.batch_execute("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> OrmResult<()> {
        self.client.batch_execute("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> OrmResult<()> {
        self.client.batch_execute("ROLLBACK")?;
        Ok(())
    }
}

fn convert_row(row: &postgres::Row) -> OrmResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        columns.push((column.name().to_string(), convert_cell(row, i, column.type_())?));
    }
    Ok(Row::new(columns))
}

fn convert_cell(row: &postgres::Row, index: usize, ty: &Type) -> OrmResult<Value> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)?.into()
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)?.map(i64::from).into()
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)?.map(i64::from).into()
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(index)?.into()
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)?.map(f64::from).into()
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index)?.into()
    } else if *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(index)?.into()
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(index)?.into()
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(index)?.into()
    } else {
        warn!(column_type = %ty, "unsupported column type, reading as null");
        Value::Null
    };
    Ok(value)
}
