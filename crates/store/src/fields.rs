//! Record type schema: field kinds, descriptors, and value cleaning.

use std::{fmt, str::FromStr};

use {
    chrono::{NaiveDate, NaiveDateTime, NaiveTime},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value, json},
};

use crate::{Error, FieldErrors, record_store::Record};

const REQUIRED: &str = "This field is required.";

/// Closed set of field kinds a record type may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    /// Holds the identity of one related record.
    RelationToOne,
    /// Holds a list of related identities.
    RelationToMany,
    /// Opaque JSON value.
    Other,
}

impl FieldKind {
    /// Parse a kind name as it appears in configuration. Unknown names are a
    /// construction-time error.
    pub fn parse(field: &str, name: &str) -> crate::Result<Self> {
        name.parse().map_err(|()| Error::UnknownFieldKind {
            field: field.to_string(),
            kind: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "date_time",
            Self::Time => "time",
            Self::RelationToOne => "relation_to_one",
            Self::RelationToMany => "relation_to_many",
            Self::Other => "other",
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::RelationToOne | Self::RelationToMany)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Time)
    }

    /// Client-side reader type name.
    fn reader_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Time => "string",
            Self::Integer | Self::RelationToOne => "int",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date | Self::DateTime => "date",
            Self::RelationToMany | Self::Other => "auto",
        }
    }

    fn date_format(&self) -> Option<&'static str> {
        match self {
            Self::Date => Some("Y-m-d"),
            Self::DateTime => Some("Y-m-d\\TH:i:s"),
            Self::Time => Some("H:i:s"),
            _ => None,
        }
    }
}

impl FromStr for FieldKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_ascii_lowercase().replace(['-', ' '], "_");
        let name = name.strip_suffix("field").unwrap_or(&name);
        Ok(match name.trim_end_matches('_') {
            "text" | "string" | "char" | "email" | "url" | "slug" => Self::Text,
            "integer" | "int" | "auto" | "big_integer" => Self::Integer,
            "float" | "decimal" | "number" => Self::Float,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "date_time" | "datetime" | "timestamp" => Self::DateTime,
            "time" => Self::Time,
            "relation_to_one" | "foreign_key" | "foreignkey" | "one_to_one" => Self::RelationToOne,
            "relation_to_many" | "many_to_many" | "manytomany" => Self::RelationToMany,
            "other" | "json" => Self::Other,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Human-readable column header; defaults to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            nullable: false,
            primary_key: false,
            label: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Reader configs for client-side record binding. Relation-to-one fields
    /// yield two configs: the relation itself and its `<name>_id` alias.
    pub fn reader_config(&self) -> Vec<Value> {
        let mut config = Map::new();
        config.insert("name".into(), json!(self.name));
        config.insert("type".into(), json!(self.kind.reader_type()));
        config.insert("allowBlank".into(), json!(self.nullable));
        if let Some(format) = self.kind.date_format() {
            config.insert("dateFormat".into(), json!(format));
        }
        if let Some(default) = &self.default {
            config.insert("defaultValue".into(), default.clone());
        }
        let mut configs = vec![Value::Object(config)];
        if self.kind == FieldKind::RelationToOne {
            configs.push(json!({
                "name": format!("{}_id", self.name),
                "type": "int",
                "mapping": self.name,
                "allowBlank": self.nullable,
            }));
        }
        configs
    }

    /// Display-oriented column descriptor for grids.
    pub fn column_config(&self) -> Value {
        let mut config = Map::new();
        config.insert(
            "header".into(),
            json!(self.label.as_deref().unwrap_or(&self.name)),
        );
        config.insert("dataIndex".into(), json!(self.name));
        config.insert("sortable".into(), json!(!self.kind.is_relation()));
        let xtype = match self.kind {
            FieldKind::Integer | FieldKind::Float => Some("numbercolumn"),
            FieldKind::Boolean => Some("booleancolumn"),
            FieldKind::Date | FieldKind::DateTime => Some("datecolumn"),
            _ => None,
        };
        if let Some(xtype) = xtype {
            config.insert("xtype".into(), json!(xtype));
        }
        if self.kind == FieldKind::Integer {
            config.insert("format".into(), json!("0"));
        }
        if let Some(format) = self.kind.date_format()
            && self.kind != FieldKind::Time
        {
            config.insert("format".into(), json!(format));
        }
        if self.primary_key {
            config.insert("hidden".into(), json!(true));
        }
        Value::Object(config)
    }

    /// Coerce `value` to this field's kind.
    fn coerce(&self, value: Value) -> Result<Value, String> {
        if value.is_null() || value.as_str().is_some_and(|s| s.is_empty() && self.kind != FieldKind::Text)
        {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(REQUIRED.into())
            };
        }
        match self.kind {
            FieldKind::Text => match value {
                Value::String(s) if s.is_empty() && !self.nullable => Err(REQUIRED.into()),
                Value::String(s) => Ok(Value::String(s)),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err("Enter a valid text value.".into()),
            },
            FieldKind::Integer => integer_of(&value)
                .map(Value::from)
                .ok_or_else(|| "Enter a whole number.".into()),
            FieldKind::Float => match &value {
                Value::Number(_) => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| "Enter a number.".into()),
                _ => Err("Enter a number.".into()),
            },
            FieldKind::Boolean => match &value {
                Value::Bool(_) => Ok(value),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "on" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "off" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err("Enter a valid boolean.".into()),
                },
                _ => Err("Enter a valid boolean.".into()),
            },
            FieldKind::Date => parse_date(&value)
                .map(|d| json!(d.format("%Y-%m-%d").to_string()))
                .ok_or_else(|| "Enter a valid date.".into()),
            FieldKind::DateTime => parse_datetime(&value)
                .map(|d| json!(d.format("%Y-%m-%dT%H:%M:%S").to_string()))
                .ok_or_else(|| "Enter a valid date/time.".into()),
            FieldKind::Time => parse_time(&value)
                .map(|t| json!(t.format("%H:%M:%S").to_string()))
                .ok_or_else(|| "Enter a valid time.".into()),
            FieldKind::RelationToOne => relation_id(&value).ok_or_else(|| "Select a valid choice.".into()),
            FieldKind::RelationToMany => match value {
                Value::Array(items) => items
                    .iter()
                    .map(relation_id)
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Array)
                    .ok_or_else(|| "Enter a list of values.".into()),
                other => relation_id(&other)
                    .map(|id| Value::Array(vec![id]))
                    .ok_or_else(|| "Enter a list of values.".into()),
            },
            FieldKind::Other => Ok(value),
        }
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn relation_id(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) => map.get("id").and_then(relation_id),
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => Some(match s.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => value.clone(),
        }),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(value).map(|dt| dt.date()))
}

fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(value: &Value) -> Option<NaiveTime> {
    let text = value.as_str()?.trim();
    ["%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

/// Schema of one record type: its name, identity field, and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub id_field: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    /// Build a record type. When no field is marked as primary key, an
    /// integer identity field named `id_field` is prepended.
    pub fn new(
        name: impl Into<String>,
        id_field: impl Into<String>,
        mut fields: Vec<FieldDescriptor>,
    ) -> Self {
        let id_field = id_field.into();
        if !fields.iter().any(|f| f.primary_key) {
            match fields.iter_mut().find(|f| f.name == id_field) {
                Some(field) => field.primary_key = true,
                None => fields.insert(0, FieldDescriptor::new(&id_field, FieldKind::Integer).primary_key()),
            }
        }
        Self {
            name: name.into(),
            id_field,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields searched by the free-text `query` parameter: text fields that
    /// are neither the identity nor relations nor temporal.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| !f.primary_key && f.name != self.id_field && f.kind == FieldKind::Text)
    }

    /// Validate and coerce `input` into a storable record.
    ///
    /// On create (`existing` is `None`) missing fields take their default,
    /// then null when nullable; otherwise they are required. On update,
    /// missing fields keep their current value. Unknown input keys and the
    /// identity field are ignored.
    pub fn clean(&self, mut input: Record, existing: Option<&Record>) -> crate::Result<Record> {
        let mut out = existing.cloned().unwrap_or_default();
        let mut errors = FieldErrors::new();
        for field in self.fields.iter().filter(|f| !f.primary_key) {
            let value = match input.remove(&field.name) {
                Some(value) => value,
                None if existing.is_some() => continue,
                None => match &field.default {
                    Some(default) => default.clone(),
                    None if field.kind == FieldKind::Boolean => Value::Bool(false),
                    None if field.kind == FieldKind::RelationToMany => Value::Array(Vec::new()),
                    None => Value::Null,
                },
            };
            match field.coerce(value) {
                Ok(clean) => {
                    out.insert(field.name.clone(), clean);
                },
                Err(message) => {
                    errors.entry(field.name.clone()).or_default().push(message);
                },
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(Error::Validation(errors))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn book() -> RecordType {
        RecordType::new("Book", "id", vec![
            FieldDescriptor::new("title", FieldKind::Text),
            FieldDescriptor::new("pages", FieldKind::Integer).with_default(json!(0)),
            FieldDescriptor::new("published", FieldKind::Date).nullable(),
            FieldDescriptor::new("in_print", FieldKind::Boolean),
            FieldDescriptor::new("author", FieldKind::RelationToOne).nullable(),
        ])
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn unknown_kind_is_construction_error() {
        let err = FieldKind::parse("cover", "ImageField").unwrap_err();
        assert!(matches!(err, Error::UnknownFieldKind { ref kind, .. } if kind == "ImageField"));
        assert_eq!(FieldKind::parse("x", "CharField").unwrap(), FieldKind::Text);
        assert_eq!(FieldKind::parse("x", "ForeignKey").unwrap(), FieldKind::RelationToOne);
        assert_eq!(FieldKind::parse("x", "date-time").unwrap(), FieldKind::DateTime);
    }

    #[test]
    fn record_type_adds_identity_field() {
        let rt = book();
        assert_eq!(rt.fields[0].name, "id");
        assert!(rt.fields[0].primary_key);
        let searchable: Vec<_> = rt.searchable_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(searchable, vec!["title"]);
    }

    #[test]
    fn clean_applies_defaults_and_coercion() {
        let cleaned = book()
            .clean(record(json!({"title": "Dune", "pages": "412", "in_print": "on", "id": 99})), None)
            .unwrap();
        assert_eq!(cleaned["pages"], json!(412));
        assert_eq!(cleaned["in_print"], json!(true));
        assert_eq!(cleaned["published"], Value::Null);
        assert!(!cleaned.contains_key("id"));
    }

    #[test]
    fn clean_reports_field_errors() {
        let err = book()
            .clean(record(json!({"pages": "many", "published": "yesterday"})), None)
            .unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors["title"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["pages"], vec!["Enter a whole number.".to_string()]);
        assert_eq!(errors["published"], vec!["Enter a valid date.".to_string()]);
    }

    #[test]
    fn clean_on_update_keeps_missing_fields() {
        let existing = record(json!({"id": 1, "title": "Dune", "pages": 412, "in_print": true}));
        let cleaned = book()
            .clean(record(json!({"pages": 500})), Some(&existing))
            .unwrap();
        assert_eq!(cleaned["title"], json!("Dune"));
        assert_eq!(cleaned["pages"], json!(500));
        assert_eq!(cleaned["id"], json!(1));
    }

    #[test]
    fn relation_values_collapse_to_ids() {
        let cleaned = book()
            .clean(record(json!({"title": "x", "author": {"id": "7", "name": "Ann"}})), None)
            .unwrap();
        assert_eq!(cleaned["author"], json!(7));
    }

    #[test]
    fn reader_config_for_relation_has_alias() {
        let field = FieldDescriptor::new("author", FieldKind::RelationToOne);
        let configs = field.reader_config();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1]["name"], "author_id");
        assert_eq!(configs[1]["mapping"], "author");
    }

    #[test]
    fn column_config_for_date() {
        let col = FieldDescriptor::new("published", FieldKind::Date)
            .with_label("Published")
            .column_config();
        assert_eq!(col["header"], "Published");
        assert_eq!(col["xtype"], "datecolumn");
        assert_eq!(col["format"], "Y-m-d");
    }
}
