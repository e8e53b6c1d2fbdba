//! Mongo-style filter expression compiler.
//!
//! Grammar:
//! - `{field: value}` — case-insensitive equality
//! - `{field: {"$op": value, ...}}` — comparisons, joined with AND
//! - `{field: {"$not": {"$op": value}}}` — negated comparison
//! - `{field: {"sub": ...}}` — comparison on the qualified path `field__sub`
//! - `{"$and": [...]}`, `{"$or": [...]}`, `{"$not": {...}}` — combinators
//!
//! Objects holding several keys are the AND of each key's expression.
//! Shapes that do not fit the grammar degrade to [`Predicate::True`] with a
//! warning; only unknown `$` keys are errors.

use {serde_json::Value, tracing::warn};

use crate::{
    Error, Result,
    predicate::{Op, PATH_SEPARATOR, Predicate},
};

const AND: &str = "$and";
const OR: &str = "$or";
const NOT: &str = "$not";

/// Compile JSON text into a predicate. Text that is not valid JSON matches
/// everything.
pub fn compile_str(text: &str) -> Result<Predicate> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_item(&value),
        Err(e) => {
            warn!(error = %e, "filter expression is not valid JSON, matching everything");
            Ok(Predicate::True)
        },
    }
}

/// Compile a decoded filter expression. A top-level string is treated as
/// JSON text and decoded first.
pub fn compile(value: &Value) -> Result<Predicate> {
    match value {
        Value::String(text) => compile_str(text),
        other => parse_item(other),
    }
}

/// Compile a flat `property = value` lookup. A trailing `__<op>` segment on
/// the property selects the operator (`name__icontains`); otherwise the
/// lookup is an exact match.
pub fn lookup(property: &str, value: Value) -> Predicate {
    if let Some((field, suffix)) = property.rsplit_once(PATH_SEPARATOR)
        && !field.is_empty()
        && let Ok(op) = suffix.parse::<Op>()
    {
        return Predicate::comparison(field, op, value);
    }
    Predicate::comparison(property, Op::Exact, value)
}

fn parse_item(value: &Value) -> Result<Predicate> {
    let Some(map) = value.as_object() else {
        warn!(%value, "filter item is not an object, ignoring");
        return Ok(Predicate::True);
    };
    let mut parts = Vec::with_capacity(map.len());
    for (key, inner) in map {
        if key.starts_with('$') {
            parts.push(parse_logical(key, inner)?);
        } else {
            parts.push(parse_field(key, inner)?);
        }
    }
    Ok(Predicate::and(parts))
}

fn parse_logical(key: &str, value: &Value) -> Result<Predicate> {
    match key {
        AND | OR => {
            let Some(items) = value.as_array() else {
                warn!(operator = key, "logical operand is not a list, ignoring");
                return Ok(Predicate::True);
            };
            let children = items.iter().map(parse_item).collect::<Result<Vec<_>>>()?;
            Ok(if key == AND {
                Predicate::and(children)
            } else {
                Predicate::or(children)
            })
        },
        NOT => Ok(Predicate::negate(parse_item(value)?)),
        other => Err(Error::UnsupportedLogicalOperator(other.to_string())),
    }
}

fn parse_field(field: &str, value: &Value) -> Result<Predicate> {
    let Some(map) = value.as_object() else {
        return Ok(Predicate::comparison(field, Op::IExact, value.clone()));
    };
    let mut parts = Vec::with_capacity(map.len());
    for (key, inner) in map {
        if key == NOT {
            parts.push(Predicate::negate(parse_field(field, inner)?));
        } else if key.starts_with('$') {
            let op = Op::from_sigil(key).ok_or_else(|| Error::UnsupportedComparison(key.clone()))?;
            parts.push(Predicate::comparison(field, op, inner.clone()));
        } else {
            parts.push(parse_field(&format!("{field}{PATH_SEPARATOR}{key}"), inner)?);
        }
    }
    Ok(Predicate::and(parts))
}
