//! Schema metadata for client-side record binding and grid columns.

use serde_json::{Map, Value, json};

use crate::{Error, FieldDescriptor, RecordType, Result, StoreConfig};

/// Fields of `record_type` to describe: the explicit `subset` when given
/// (every name must exist), otherwise all fields, minus excluded ones.
pub fn selected_fields<'a>(
    record_type: &'a RecordType,
    config: &StoreConfig,
    subset: Option<&[String]>,
) -> Result<Vec<&'a FieldDescriptor>> {
    let fields = match subset {
        Some(names) => names
            .iter()
            .map(|name| {
                record_type
                    .field(name)
                    .ok_or_else(|| Error::UnknownField(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?,
        None => record_type.fields.iter().collect(),
    };
    Ok(fields
        .into_iter()
        .filter(|f| !config.is_excluded(&f.name))
        .collect())
}

/// Reader configs for every selected field, with overrides, name mappings
/// and extra fields applied.
pub fn meta_fields(
    record_type: &RecordType,
    config: &StoreConfig,
    subset: Option<&[String]>,
) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for field in selected_fields(record_type, config, subset)? {
        if let Some(custom) = config.field_overrides.get(&field.name) {
            out.push(custom.clone());
            continue;
        }
        let mut configs = field.reader_config();
        if let Some(mapped) = config.mappings.get(&field.name)
            && let Some(Value::Object(first)) = configs.first_mut()
        {
            first.insert("mapping".into(), json!(field.name));
            first.insert("name".into(), json!(mapped));
        }
        out.extend(configs);
    }
    out.extend(config.extra_fields.iter().cloned());
    Ok(out)
}

/// Grid column descriptors for every selected field.
pub fn meta_columns(
    record_type: &RecordType,
    config: &StoreConfig,
    subset: Option<&[String]>,
) -> Result<Vec<Value>> {
    Ok(selected_fields(record_type, config, subset)?
        .into_iter()
        .map(FieldDescriptor::column_config)
        .collect())
}

/// The `metaData` object: key names, field configs, optional sort info,
/// then custom entries merged last.
pub fn meta_data(
    record_type: &RecordType,
    config: &StoreConfig,
    subset: Option<&[String]>,
) -> Result<Map<String, Value>> {
    let keys = &config.keys;
    let mut meta = Map::new();
    meta.insert("idProperty".into(), json!(keys.id_property));
    meta.insert("root".into(), json!(keys.root));
    meta.insert("totalProperty".into(), json!(keys.total));
    meta.insert("successProperty".into(), json!(keys.success));
    meta.insert("messageProperty".into(), json!(keys.message));
    meta.insert(
        "fields".into(),
        Value::Array(meta_fields(record_type, config, subset)?),
    );
    if let Some(sort_info) = &config.sort_info {
        meta.insert("sortInfo".into(), sort_info.clone());
    }
    for (key, value) in &config.custom_meta {
        meta.insert(key.clone(), value.clone());
    }
    Ok(meta)
}
