//! Predicate-to-SQL translation.
//!
//! Walks the expression tree and emits a parenthesized SQL fragment with
//! `$n` placeholders assigned left to right, collecting the bound values in
//! the same order. Property names are resolved against the table descriptor;
//! an unknown property or a shape outside the grammar fails the whole
//! translation.

use crate::error::{OrmError, OrmResult};
use crate::query::{BinOp, Direction, Expr, MatchKind, OrderKey};
use crate::schema::TableDescriptor;
use crate::value::Value;

/// Translates a filter predicate into a WHERE fragment (without the WHERE
/// keyword) plus its positional parameters.
pub fn translate_filter(
    descriptor: &TableDescriptor,
    predicate: &Expr,
) -> OrmResult<(String, Vec<Value>)> {
    let mut params = Vec::new();
    let fragment = walk(descriptor, predicate, &mut params)?;
    Ok((fragment, params))
}

/// Translates order-by keys into an ORDER BY fragment (without the keyword).
pub fn translate_order(descriptor: &TableDescriptor, keys: &[OrderKey]) -> OrmResult<String> {
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        let column = resolve_column(descriptor, &key.property)?;
        let direction = match key.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        parts.push(format!("\"{}\" {}", column, direction));
    }
    Ok(parts.join(", "))
}

fn walk(
    descriptor: &TableDescriptor,
    expr: &Expr,
    params: &mut Vec<Value>,
) -> OrmResult<String> {
    match expr {
        Expr::Column(property) => {
            let column = resolve_column(descriptor, property)?;
            Ok(format!("\"{}\"", column))
        }
        Expr::Literal(Value::Null) => Ok("NULL".to_string()),
        Expr::Literal(value) => {
            params.push(value.clone());
            Ok(format!("${}", params.len()))
        }
        Expr::Binary { op, left, right } => {
            let lhs = walk(descriptor, left, params)?;
            let rhs = walk(descriptor, right, params)?;
            let operator = match (op, rhs.as_str()) {
                // Comparisons against a null literal only make sense as
                // IS (NOT) NULL in SQL's three-valued logic.
                (BinOp::Eq, "NULL") => "IS",
                (BinOp::Ne, "NULL") => "IS NOT",
                (BinOp::Eq, _) => "=",
                (BinOp::Ne, _) => "<>",
                (BinOp::Lt, _) => "<",
                (BinOp::Le, _) => "<=",
                (BinOp::Gt, _) => ">",
                (BinOp::Ge, _) => ">=",
                (BinOp::And, _) => "AND",
                (BinOp::Or, _) => "OR",
            };
            Ok(format!("({} {} {})", lhs, operator, rhs))
        }
        Expr::Not(inner) => {
            let fragment = walk(descriptor, inner, params)?;
            Ok(format!("(NOT {})", fragment))
        }
        Expr::Like {
            target,
            kind,
            value,
        } => {
            let column = match target.as_ref() {
                Expr::Column(property) => resolve_column(descriptor, property)?,
                other => {
                    return Err(OrmError::NotSupported(format!(
                        "string match target must be a column, got {:?}",
                        other
                    )))
                }
            };
            let pattern = match kind {
                MatchKind::Contains => format!("%{}%", value),
                MatchKind::StartsWith => format!("{}%", value),
                MatchKind::EndsWith => format!("%{}", value),
            };
            params.push(Value::Text(pattern));
            Ok(format!("(\"{}\" LIKE ${})", column, params.len()))
        }
    }
}

fn resolve_column<'a>(descriptor: &'a TableDescriptor, property: &str) -> OrmResult<&'a str> {
    descriptor
        .column(property)
        .map(|c| c.name.as_str())
        .ok_or_else(|| {
            OrmError::NotSupported(format!(
                "unknown property '{}' on entity '{}'",
                property, descriptor.entity
            ))
        })
}
