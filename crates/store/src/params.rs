//! Extraction of list-view request parameters.

use {
    remoting_query::{Op, Predicate, compile, lookup},
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    Direction, RecordType, Result, SortSpec, StoreKeys,
    config::{FILTER_VALUE_KEY, QUERY_FILTER_PROPERTY},
};

/// Filter, sort and paging parsed out of a request parameter object.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub predicate: Predicate,
    pub sort: Vec<SortSpec>,
    pub start: Option<u64>,
    pub limit: Option<u64>,
}

impl QueryParams {
    /// Read the reserved keys named by `keys` out of `params`.
    ///
    /// `query` takes priority over `filter`: when present it expands into an
    /// OR of case-insensitive substring matches over the searchable fields
    /// of `record_type` and `filter` is ignored.
    pub fn from_request(params: &Map<String, Value>, keys: &StoreKeys, record_type: &RecordType) -> Result<Self> {
        let predicate = if let Some(template) = params.get(&keys.query) {
            search_predicate(record_type, template)
        } else if let Some(filter) = params.get(&keys.filter) {
            filter_predicate(filter, keys)?
        } else {
            Predicate::True
        };
        Ok(Self {
            predicate,
            sort: sort_specs(params, keys),
            start: params.get(&keys.start).and_then(as_count),
            limit: params.get(&keys.limit).and_then(as_count),
        })
    }
}

/// Free-text search: `{"$or": [{field: {"$icontains": text}}, ...]}` over
/// every searchable field.
pub fn search_predicate(record_type: &RecordType, template: &Value) -> Predicate {
    let text = match template {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Predicate::or(
        record_type
            .searchable_fields()
            .map(|f| Predicate::comparison(&f.name, Op::IContains, Value::String(text.clone()))),
    )
}

fn filter_predicate(filter: &Value, keys: &StoreKeys) -> Result<Predicate> {
    let items: Vec<&Value> = match filter {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let (Some(property), Some(value)) = (
            item.get(&keys.property).and_then(Value::as_str),
            item.get(FILTER_VALUE_KEY),
        ) else {
            debug!(%item, "filter item lacks property or value, skipping");
            continue;
        };
        if property == QUERY_FILTER_PROPERTY {
            parts.push(compile(value)?);
        } else {
            parts.push(lookup(property, value.clone()));
        }
    }
    Ok(Predicate::and(parts))
}

fn sort_specs(params: &Map<String, Value>, keys: &StoreKeys) -> Vec<SortSpec> {
    match params.get(&keys.sort) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let field = item.get(&keys.property)?.as_str()?;
                let direction = item.get(&keys.direction)?.as_str()?;
                Some(SortSpec::new(field, Direction::parse(direction)))
            })
            .collect(),
        Some(Value::String(field)) if !field.is_empty() => {
            let direction = params
                .get(&keys.direction)
                .and_then(Value::as_str)
                .map(Direction::parse)
                .unwrap_or_default();
            vec![SortSpec::new(field.as_str(), direction)]
        },
        _ => Vec::new(),
    }
}

/// Non-negative integer from a number or numeric string.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
