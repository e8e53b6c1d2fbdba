//! Result bundle assembly.

use serde_json::{Map, Value, json};

use crate::{
    RecordType, Result, StoreConfig, StoreKeys,
    metadata::{meta_columns, meta_data},
    record_store::Record,
};

/// What to attach to a bundle besides the records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Attach `metaData`; honored only when the store enables metadata.
    pub metadata: bool,
    /// Attach grid `columns`.
    pub columns: bool,
    /// Restrict records and metadata to these fields (the identity is
    /// always kept).
    pub fields: Option<Vec<String>>,
}

impl QueryOptions {
    pub fn with_metadata(mut self, metadata: bool) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_columns(mut self, columns: bool) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields = fields;
        self
    }
}

/// Build `{success: true, total, <root>: records, metaData?, columns?}`
/// under the configured key names. Each record carries its identity under
/// the configured id property.
pub fn serialize(
    record_type: &RecordType,
    config: &StoreConfig,
    records: Vec<Record>,
    total: u64,
    options: &QueryOptions,
) -> Result<Value> {
    let keys = &config.keys;
    let subset = options.fields.as_deref();
    let records: Vec<Value> = records
        .into_iter()
        .map(|record| Value::Object(project(record_type, config, record, subset)))
        .collect();

    let mut bundle = Map::new();
    bundle.insert(keys.success.clone(), json!(true));
    bundle.insert(keys.total.clone(), json!(total));
    bundle.insert(keys.root.clone(), Value::Array(records));
    if options.metadata && config.metadata {
        bundle.insert(
            "metaData".into(),
            Value::Object(meta_data(record_type, config, subset)?),
        );
    }
    if options.columns {
        bundle.insert(
            "columns".into(),
            Value::Array(meta_columns(record_type, config, subset)?),
        );
    }
    Ok(Value::Object(bundle))
}

/// `{success: false, <root>: [], total: 0, message}`.
pub fn failure(keys: &StoreKeys, message: Value) -> Value {
    let mut bundle = Map::new();
    bundle.insert(keys.success.clone(), json!(false));
    bundle.insert(keys.root.clone(), json!([]));
    bundle.insert(keys.total.clone(), json!(0));
    bundle.insert(keys.message.clone(), message);
    Value::Object(bundle)
}

fn project(
    record_type: &RecordType,
    config: &StoreConfig,
    mut record: Record,
    subset: Option<&[String]>,
) -> Record {
    let id = record.remove(&record_type.id_field).unwrap_or(Value::Null);
    record.retain(|name, _| {
        !config.is_excluded(name) && subset.is_none_or(|fields| fields.iter().any(|f| f == name))
    });
    record.insert(config.keys.id_property.clone(), id);
    record
}
