//! Write payload clean-up applied before records reach the store.

use {
    remoting_store::{FieldKind, Record, RecordType},
    serde_json::Value,
};

const RELATION_ID_SUFFIX: &str = "_id";

/// Collapse relation values to identities: `<rel>_id` keys move to `<rel>`
/// when `<rel>` is a relation field, a related object becomes its `id`, and
/// a list of related objects becomes the list of their ids.
pub fn relation_fields(record_type: &RecordType, mut data: Record) -> Record {
    let aliases: Vec<String> = data
        .keys()
        .filter(|key| record_type.field(key).is_none())
        .filter(|key| {
            key.strip_suffix(RELATION_ID_SUFFIX)
                .and_then(|rel| record_type.field(rel))
                .is_some_and(|f| f.kind.is_relation())
        })
        .cloned()
        .collect();
    for alias in aliases {
        if let Some(value) = data.remove(&alias) {
            let rel = &alias[..alias.len() - RELATION_ID_SUFFIX.len()];
            data.insert(rel.to_string(), value);
        }
    }

    for field in &record_type.fields {
        let Some(value) = data.get_mut(&field.name) else {
            continue;
        };
        match field.kind {
            FieldKind::RelationToOne if value.is_object() => {
                *value = value.get("id").cloned().unwrap_or(Value::Null);
            },
            FieldKind::RelationToMany => {
                if let Value::Array(items) = value {
                    for item in items.iter_mut() {
                        if let Some(id) = item.get("id").cloned() {
                            *item = id;
                        }
                    }
                }
            },
            _ => {},
        }
    }
    data
}

/// Drop any client-supplied identity: the wire id property and the store's
/// identity field.
pub fn strip_identity(record_type: &RecordType, id_property: &str, mut data: Record) -> Record {
    data.remove(id_property);
    data.remove(&record_type.id_field);
    data
}
