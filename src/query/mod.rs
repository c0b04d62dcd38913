//! Typed query predicates
//!
//! A small, closed predicate/order AST built through a fluent API and
//! translated into a WHERE/ORDER BY fragment plus positional parameters.
//! The grammar is deliberately not extensible by accident: anything the
//! translator does not recognize fails with `NotSupported`.

mod translate;

pub use translate::{translate_filter, translate_order};

use crate::value::Value;

/// Comparison and logical operators of the predicate grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// String-matching predicates translated to LIKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `%value%`
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

/// A predicate expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Property member access, resolved to a mapped column name.
    Column(String),
    /// A literal value, bound as a positional parameter.
    Literal(Value),
    /// Binary comparison or logical connective.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// String match against a column, translated to LIKE.
    Like {
        target: Box<Expr>,
        kind: MatchKind,
        value: String,
    },
}

/// Starts an expression from a property member access.
pub fn col(property: impl Into<String>) -> Expr {
    Expr::Column(property.into())
}

/// Starts an expression from a literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    fn binary(self, op: BinOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn eq(self, right: Expr) -> Expr {
        self.binary(BinOp::Eq, right)
    }

    pub fn ne(self, right: Expr) -> Expr {
        self.binary(BinOp::Ne, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinOp::Lt, right)
    }

    pub fn le(self, right: Expr) -> Expr {
        self.binary(BinOp::Le, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinOp::Gt, right)
    }

    pub fn ge(self, right: Expr) -> Expr {
        self.binary(BinOp::Ge, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinOp::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinOp::Or, right)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn contains(self, value: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            kind: MatchKind::Contains,
            value: value.into(),
        }
    }

    pub fn starts_with(self, value: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            kind: MatchKind::StartsWith,
            value: value.into(),
        }
    }

    pub fn ends_with(self, value: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            kind: MatchKind::EndsWith,
            value: value.into(),
        }
    }
}

/// Sort direction for an order-by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// One order-by key: a property member access plus a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub property: String,
    pub direction: Direction,
}

/// A composed query: optional filter predicate plus ordering keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub(crate) filter: Option<Expr>,
    pub(crate) order: Vec<OrderKey>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter predicate, replacing any previous one.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Appends an ascending order-by key.
    pub fn order_by(mut self, property: impl Into<String>) -> Self {
        self.order.push(OrderKey {
            property: property.into(),
            direction: Direction::Asc,
        });
        self
    }

    /// Appends a descending order-by key.
    pub fn order_by_desc(mut self, property: impl Into<String>) -> Self {
        self.order.push(OrderKey {
            property: property.into(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.order.is_empty()
    }
}
