//! In-process [`RecordStore`] backed by a vector of rows.

use std::sync::Arc;

use {
    async_trait::async_trait,
    remoting_query::{Op, Predicate, compare_for_sort},
    serde_json::Value,
    tokio::sync::{Mutex, RwLock},
    tracing::debug,
};

use crate::{
    Collection, Direction, Error, RecordType, Result,
    record_store::{Record, RecordStore, SavepointId, WriteGuard},
};

#[derive(Clone)]
struct Snapshot {
    rows: Vec<Record>,
    next_id: i64,
}

struct State {
    rows: Vec<Record>,
    next_id: i64,
    next_savepoint: SavepointId,
    /// Open savepoints, innermost last.
    savepoints: Vec<(SavepointId, Snapshot)>,
}

impl State {
    fn position(&self, id_field: &str, id: &Value) -> Option<usize> {
        let probe = Predicate::comparison(id_field, Op::Exact, id.clone());
        self.rows.iter().position(|row| probe.matches(row))
    }
}

/// Rows live in insertion order; identities are auto-incremented integers.
pub struct MemoryRecordStore {
    record_type: RecordType,
    state: RwLock<State>,
    writes: Arc<Mutex<()>>,
}

impl MemoryRecordStore {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            state: RwLock::new(State {
                rows: Vec::new(),
                next_id: 1,
                next_savepoint: 1,
                savepoints: Vec::new(),
            }),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Seed the store. Each seed row is cleaned like a create; rows that
    /// carry an integer identity keep it.
    pub fn with_records(record_type: RecordType, seed: Vec<Record>) -> Result<Self> {
        let id_field = record_type.id_field.clone();
        let mut rows = Vec::with_capacity(seed.len());
        let mut next_id = 1;
        for mut input in seed {
            let explicit = input.remove(&id_field).and_then(|v| v.as_i64());
            let mut row = record_type.clean(input, None)?;
            let id = explicit.unwrap_or(next_id);
            next_id = next_id.max(id + 1);
            row.insert(id_field.clone(), Value::from(id));
            rows.push(row);
        }
        let mut store = Self::new(record_type);
        {
            let state = store.state.get_mut();
            state.rows = rows;
            state.next_id = next_id;
        }
        Ok(store)
    }
}

fn sort_rows(rows: &mut [Record], collection: &Collection) {
    if collection.order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        collection
            .order
            .iter()
            .map(|spec| {
                let ord = compare_for_sort(a.get(&spec.field), b.get(&spec.field));
                match spec.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    async fn fetch(&self, collection: &Collection) -> Result<Vec<Record>> {
        let predicate = collection.predicate();
        let mut rows: Vec<Record> = {
            let state = self.state.read().await;
            state
                .rows
                .iter()
                .filter(|row| predicate.matches(row))
                .cloned()
                .collect()
        };
        sort_rows(&mut rows, collection);
        if let Some((offset, size)) = collection.window {
            rows = rows
                .into_iter()
                .skip(offset as usize)
                .take(size as usize)
                .collect();
        }
        Ok(rows)
    }

    async fn count(&self, collection: &Collection) -> Result<u64> {
        let predicate = collection.predicate();
        let state = self.state.read().await;
        Ok(state.rows.iter().filter(|row| predicate.matches(row)).count() as u64)
    }

    async fn get(&self, id: &Value) -> Result<Record> {
        let state = self.state.read().await;
        state
            .position(&self.record_type.id_field, id)
            .map(|i| state.rows[i].clone())
            .ok_or_else(|| Error::not_found(&self.record_type.name, id.clone()))
    }

    async fn create(&self, input: Record) -> Result<Record> {
        let mut row = self.record_type.clean(input, None)?;
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        row.insert(self.record_type.id_field.clone(), Value::from(id));
        state.rows.push(row.clone());
        debug!(record_type = %self.record_type.name, id, "record created");
        Ok(row)
    }

    async fn update(&self, id: &Value, changes: Record) -> Result<Record> {
        let mut state = self.state.write().await;
        let index = state
            .position(&self.record_type.id_field, id)
            .ok_or_else(|| Error::not_found(&self.record_type.name, id.clone()))?;
        let row = self.record_type.clean(changes, Some(&state.rows[index]))?;
        state.rows[index] = row.clone();
        debug!(record_type = %self.record_type.name, %id, "record updated");
        Ok(row)
    }

    async fn delete(&self, id: &Value) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .position(&self.record_type.id_field, id)
            .ok_or_else(|| Error::not_found(&self.record_type.name, id.clone()))?;
        state.rows.remove(index);
        debug!(record_type = %self.record_type.name, %id, "record deleted");
        Ok(())
    }

    async fn lock_writes(&self) -> WriteGuard {
        Arc::clone(&self.writes).lock_owned().await
    }

    async fn savepoint(&self) -> Result<SavepointId> {
        let mut state = self.state.write().await;
        let id = state.next_savepoint;
        state.next_savepoint += 1;
        let snapshot = Snapshot {
            rows: state.rows.clone(),
            next_id: state.next_id,
        };
        state.savepoints.push((id, snapshot));
        Ok(id)
    }

    async fn commit(&self, savepoint: SavepointId) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .savepoints
            .iter()
            .position(|(id, _)| *id == savepoint)
            .ok_or(Error::Savepoint(savepoint))?;
        state.savepoints.truncate(index);
        Ok(())
    }

    async fn rollback(&self, savepoint: SavepointId) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .savepoints
            .iter()
            .position(|(id, _)| *id == savepoint)
            .ok_or(Error::Savepoint(savepoint))?;
        let (_, snapshot) = state.savepoints[index].clone();
        state.rows = snapshot.rows;
        state.next_id = snapshot.next_id;
        state.savepoints.truncate(index);
        debug!(record_type = %self.record_type.name, savepoint, "rolled back");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::{FieldDescriptor, FieldKind, SortSpec},
        serde_json::json,
    };

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn store() -> MemoryRecordStore {
        let rt = RecordType::new("Book", "id", vec![
            FieldDescriptor::new("title", FieldKind::Text),
            FieldDescriptor::new("pages", FieldKind::Integer).with_default(json!(0)),
        ]);
        MemoryRecordStore::with_records(rt, vec![
            record(json!({"title": "Dune", "pages": 412})),
            record(json!({"title": "Emma", "pages": 300})),
            record(json!({"id": 10, "title": "Ubik", "pages": 202})),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn seed_assigns_identities() {
        let store = store();
        let rows = store.fetch(&Collection::all()).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(10)]);
        let created = store.create(record(json!({"title": "Solaris"}))).await.unwrap();
        assert_eq!(created["id"], json!(11));
        assert_eq!(created["pages"], json!(0));
    }

    #[tokio::test]
    async fn fetch_filters_orders_and_windows() {
        let store = store();
        let collection = Collection::all()
            .filter(Predicate::comparison("pages", Op::Gt, json!(250)))
            .order_by(vec![SortSpec::new("pages", Direction::Asc)])
            .page(0, 1);
        let rows = store.fetch(&collection).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Emma");
        assert_eq!(store.count(&collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_id_scope_selects_nothing() {
        let store = store();
        let rows = store.fetch(&Collection::with_ids("id", vec![])).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn get_accepts_string_identity() {
        let store = store();
        assert_eq!(store.get(&json!("2")).await.unwrap()["title"], "Emma");
        let err = store.get(&json!(99)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_merges_and_validates() {
        let store = store();
        let row = store.update(&json!(1), record(json!({"pages": "500"}))).await.unwrap();
        assert_eq!(row["pages"], json!(500));
        assert_eq!(row["title"], "Dune");
        let err = store
            .update(&json!(1), record(json!({"pages": "lots"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let store = store();
        let outer = store.savepoint().await.unwrap();
        store.delete(&json!(1)).await.unwrap();
        let inner = store.savepoint().await.unwrap();
        store.create(record(json!({"title": "Solaris"}))).await.unwrap();
        store.rollback(inner).await.unwrap();
        assert_eq!(store.count(&Collection::all()).await.unwrap(), 2);
        store.rollback(outer).await.unwrap();
        assert_eq!(store.count(&Collection::all()).await.unwrap(), 3);
        assert!(matches!(store.commit(inner).await, Err(Error::Savepoint(_))));
    }

    #[tokio::test]
    async fn write_lock_is_exclusive() {
        let store = store();
        let guard = store.lock_writes().await;
        assert!(store.writes.try_lock().is_err());
        drop(guard);
        let _again = store.lock_writes().await;
    }

    #[tokio::test]
    async fn commit_keeps_changes() {
        let store = store();
        let sp = store.savepoint().await.unwrap();
        store.delete(&json!(10)).await.unwrap();
        store.commit(sp).await.unwrap();
        assert_eq!(store.count(&Collection::all()).await.unwrap(), 2);
        assert!(store.rollback(sp).await.is_err());
    }
}
