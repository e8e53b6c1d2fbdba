use {async_trait::async_trait, serde_json::Value};

use crate::{Collection, RecordType, Result};

/// One stored record: field name → value.
pub type Record = serde_json::Map<String, Value>;

/// Handle of an open savepoint.
pub type SavepointId = u64;

/// Exclusive write access to one store, released on drop.
pub type WriteGuard = tokio::sync::OwnedMutexGuard<()>;

/// Persistence capability for one record type.
///
/// Implementations interpret [`Collection`]s (scope, filter, order, window),
/// validate writes against their [`RecordType`], and provide nested
/// savepoints so a batch of writes can be undone as a unit.
///
/// Savepoints span the whole store, not one caller. A writer that opens a
/// savepoint holds [`RecordStore::lock_writes`] until it is released, so no
/// other batch writes in between.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn record_type(&self) -> &RecordType;

    async fn fetch(&self, collection: &Collection) -> Result<Vec<Record>>;

    /// Number of records the collection selects, ignoring its window.
    async fn count(&self, collection: &Collection) -> Result<u64>;

    /// Exact lookup by identity; [`crate::Error::NotFound`] when absent.
    async fn get(&self, id: &Value) -> Result<Record>;

    /// Validate and persist a new record, returning it with its identity.
    async fn create(&self, input: Record) -> Result<Record>;

    /// Apply a partial update to an existing record.
    async fn update(&self, id: &Value, changes: Record) -> Result<Record>;

    async fn delete(&self, id: &Value) -> Result<()>;

    /// Wait for exclusive write access. Readers are not blocked.
    async fn lock_writes(&self) -> WriteGuard;

    async fn savepoint(&self) -> Result<SavepointId>;

    async fn commit(&self, savepoint: SavepointId) -> Result<()>;

    async fn rollback(&self, savepoint: SavepointId) -> Result<()>;
}
