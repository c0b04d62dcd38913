//! Column descriptors and the semantic SQL type enum.

use serde::{Deserialize, Serialize};

/// Semantic SQL types supported by the engine.
///
/// Matched exhaustively in the type-mapping and DDL-generation functions;
/// the PostgreSQL spelling lives in `sql::ddl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    /// Integer (BIGINT, or BIGSERIAL for auto-increment primary keys)
    Int,
    /// Exact numeric with optional precision and scale (DECIMAL)
    Decimal,
    /// Floating point (DOUBLE PRECISION)
    Float,
    /// Variable-length character string (VARCHAR)
    Varchar,
    /// Fixed-length character string (CHAR)
    Char,
    /// Unbounded text (TEXT)
    Text,
    /// Timestamp with time zone
    TimestampTz,
    /// Timestamp without time zone
    Timestamp,
}

impl SqlType {
    /// True for types whose default literals are single-quoted in DDL.
    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            SqlType::Varchar
                | SqlType::Char
                | SqlType::Text
                | SqlType::Timestamp
                | SqlType::TimestampTz
        )
    }
}

/// A column default: either a literal (quoted/escaped per type in DDL) or a
/// raw SQL expression emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Literal(String),
    Expression(String),
}

/// Immutable metadata for one mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Owning property identifier on the entity.
    pub property: String,
    /// Database column name.
    pub name: String,
    /// Semantic SQL type.
    pub sql_type: SqlType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub primary_key: bool,
    pub required: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<DefaultValue>,
}

/// Builder for a column definition.
///
/// The column name defaults to the property identifier.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub(crate) property: String,
    pub(crate) name: String,
    pub(crate) sql_type: SqlType,
    pub(crate) length: Option<u32>,
    pub(crate) precision: Option<u32>,
    pub(crate) scale: Option<u32>,
    pub(crate) primary_key: bool,
    pub(crate) required: bool,
    pub(crate) unique: bool,
    pub(crate) auto_increment: bool,
    pub(crate) default: Option<DefaultValue>,
}

impl ColumnDef {
    pub fn new(property: impl Into<String>, sql_type: SqlType) -> Self {
        let property = property.into();
        Self {
            name: property.clone(),
            property,
            sql_type,
            length: None,
            precision: None,
            scale: None,
            primary_key: false,
            required: false,
            unique: false,
            auto_increment: false,
            default: None,
        }
    }

    /// Overrides the column name (defaults to the property identifier).
    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets a literal default value (quoted and escaped per type in DDL).
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Sets a raw SQL expression default, emitted verbatim.
    pub fn default_expression(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Expression(expr.into()));
        self
    }

    pub(crate) fn build(self) -> ColumnDescriptor {
        ColumnDescriptor {
            property: self.property,
            name: self.name,
            sql_type: self.sql_type,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            primary_key: self.primary_key,
            required: self.required,
            unique: self.unique,
            auto_increment: self.auto_increment,
            default: self.default,
        }
    }
}
