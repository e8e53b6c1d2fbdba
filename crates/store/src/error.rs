use std::collections::BTreeMap;

use thiserror::Error;

/// Field-level validation messages, keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{record_type} matching query does not exist (id {id})")]
    NotFound {
        record_type: String,
        id: serde_json::Value,
    },

    #[error("validation failed for {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    Validation(FieldErrors),

    #[error("unknown field kind `{kind}` for field `{field}`")]
    UnknownFieldKind { field: String, kind: String },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("savepoint {0} is not active")]
    Savepoint(u64),

    #[error(transparent)]
    Query(#[from] remoting_query::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(record_type: impl Into<String>, id: serde_json::Value) -> Self {
        Self::NotFound {
            record_type: record_type.into(),
            id,
        }
    }

    /// Lookup and validation failures are business failures of a single
    /// item, as opposed to store or configuration faults.
    pub fn is_item_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
