use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wire key names used by a store, both for reading request parameters and
/// for writing result bundles. Every name is independently overridable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreKeys {
    /// Key holding the record list in bundles and write payloads.
    pub root: String,
    pub total: String,
    pub success: String,
    pub message: String,
    pub start: String,
    pub limit: String,
    pub sort: String,
    pub direction: String,
    pub property: String,
    pub filter: String,
    /// Free-text search parameter; takes priority over `filter`.
    pub query: String,
    pub id_property: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            root: "records".into(),
            total: "total".into(),
            success: "success".into(),
            message: "message".into(),
            start: "start".into(),
            limit: "limit".into(),
            sort: "sort".into(),
            direction: "direction".into(),
            property: "property".into(),
            filter: "filter".into(),
            query: "query".into(),
            id_property: "id".into(),
        }
    }
}

/// Filter item property announcing that its value is a filter expression.
pub const QUERY_FILTER_PROPERTY: &str = "queryfilter";
/// Filter item key holding the compared value.
pub const FILTER_VALUE_KEY: &str = "value";

/// Per-store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub keys: StoreKeys,
    /// Whether bundles may carry schema metadata at all.
    pub metadata: bool,
    /// Field name → client-side name remapping for metadata.
    pub mappings: BTreeMap<String, String>,
    /// Fields never exposed in records or metadata.
    pub exclude_fields: Vec<String>,
    /// Explicit reader configs replacing the generated ones per field.
    pub field_overrides: BTreeMap<String, serde_json::Value>,
    /// Extra reader configs appended after the generated ones.
    pub extra_fields: Vec<serde_json::Value>,
    pub sort_info: Option<serde_json::Value>,
    /// Merged into the generated metadata object last.
    pub custom_meta: serde_json::Map<String, serde_json::Value>,
}

impl StoreConfig {
    pub fn with_metadata(mut self, metadata: bool) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.exclude_fields.iter().any(|f| f == field)
    }
}
