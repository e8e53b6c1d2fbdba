//! In-memory evaluation of predicates against JSON records.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::predicate::{Op, PATH_SEPARATOR, Predicate};

impl Predicate {
    /// Whether `record` satisfies the predicate.
    ///
    /// Qualified paths walk nested objects; when a segment resolves to an
    /// array, the comparison holds if it holds for any element. A missing
    /// field never satisfies a comparison.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match self {
            Self::True => true,
            Self::Comparison { field, op, value } => resolve(record, field)
                .into_iter()
                .any(|candidate| compare(candidate, *op, value)),
            Self::And(children) => children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
            Self::Not(child) => !child.matches(record),
        }
    }
}

fn resolve<'a>(record: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split(PATH_SEPARATOR);
    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = record.get(first).into_iter().collect();
    for segment in segments {
        current = current
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().filter_map(|i| i.get(segment)).collect(),
                other => other.get(segment).into_iter().collect::<Vec<_>>(),
            })
            .collect();
    }
    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) if !items.is_empty() => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn compare(candidate: &Value, op: Op, operand: &Value) -> bool {
    match op {
        Op::Exact => loose_eq(candidate, operand),
        Op::IExact => {
            loose_eq(candidate, operand)
                || match (candidate.as_str(), operand.as_str()) {
                    (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
                    _ => false,
                }
        },
        Op::Contains => match (candidate.as_str(), text_of(operand)) {
            (Some(haystack), Some(needle)) => haystack.contains(&needle),
            _ => false,
        },
        Op::IContains => match (candidate.as_str(), text_of(operand)) {
            (Some(haystack), Some(needle)) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            },
            _ => false,
        },
        Op::In => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| loose_eq(candidate, item))),
        Op::Gt => ordered(candidate, operand).is_some_and(Ordering::is_gt),
        Op::Gte => ordered(candidate, operand).is_some_and(Ordering::is_ge),
        Op::Lt => ordered(candidate, operand).is_some_and(Ordering::is_lt),
        Op::Lte => ordered(candidate, operand).is_some_and(Ordering::is_le),
        Op::Range => match operand.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                ordered(candidate, low).is_some_and(Ordering::is_ge)
                    && ordered(candidate, high).is_some_and(Ordering::is_le)
            },
            _ => false,
        },
    }
}

/// Scalar rendered as text, for case-insensitive and substring matching.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Equality with numeric coercion: `1`, `1.0` and `"1"` compare equal when
/// at least one side is a number.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_number() || b.is_number() {
        return match (number_of(a), number_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }
    false
}

/// Ordering between comparable scalars; `None` for incompatible kinds.
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ if a.is_number() || b.is_number() => number_of(a)?.partial_cmp(&number_of(b)?),
        _ => None,
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order used for sorting records by a field: missing and null values
/// first, then booleans, numbers, strings, arrays and objects.
pub fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ (Value::Array(_) | Value::Object(_))), Some(y))
            if kind_rank(Some(x)) == kind_rank(Some(y)) =>
        {
            x.to_string().cmp(&y.to_string())
        },
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}
