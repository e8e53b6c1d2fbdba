use std::sync::Arc;

use {
    remoting_query::Predicate,
    serde_json::{Map, Value},
    tracing::debug,
};

use crate::{
    Collection, Direction, QueryOptions, Result, SortSpec, StoreConfig, bundle,
    params::QueryParams,
    record_store::{Record, RecordStore},
};

/// One page of matched records plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: u64,
}

/// Binds a [`RecordStore`] to its wire configuration and answers list-view
/// queries against it.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn RecordStore>,
    config: StoreConfig,
}

impl StoreAdapter {
    pub fn new(store: Arc<dyn RecordStore>, config: StoreConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Filter, sort and paginate.
    ///
    /// A `base` collection replaces the full collection even when it selects
    /// nothing. Without an explicit sort, records are ordered by identity,
    /// descending. Paging applies only when both `start` and a non-zero
    /// `limit` are given; a `start` past the end yields the last page.
    pub async fn select(
        &self,
        base: Option<Collection>,
        predicate: Predicate,
        mut sort: Vec<SortSpec>,
        start: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Page> {
        if sort.is_empty() {
            sort.push(SortSpec::new(
                self.store.record_type().id_field.as_str(),
                Direction::Desc,
            ));
        }
        let collection = base
            .unwrap_or_default()
            .filter(predicate)
            .order_by(sort);
        let total = self.store.count(&collection.unpaged()).await?;
        let collection = match (start, limit) {
            (Some(start), Some(limit)) if limit > 0 => {
                let last_page = total.div_ceil(limit).max(1);
                let page = (start / limit + 1).min(last_page);
                debug!(start, limit, page, total, "paging");
                collection.page((page - 1) * limit, limit)
            },
            _ => collection,
        };
        let records = self.store.fetch(&collection).await?;
        Ok(Page { records, total })
    }

    /// Parse request parameters, select, and serialize a result bundle.
    pub async fn query(
        &self,
        base: Option<Collection>,
        params: &Map<String, Value>,
        options: &QueryOptions,
    ) -> Result<Value> {
        let params = QueryParams::from_request(params, &self.config.keys, self.store.record_type())?;
        let page = self
            .select(base, params.predicate, params.sort, params.start, params.limit)
            .await?;
        self.serialize(page.records, page.total, options)
    }

    pub fn serialize(&self, records: Vec<Record>, total: u64, options: &QueryOptions) -> Result<Value> {
        bundle::serialize(self.store.record_type(), &self.config, records, total, options)
    }

    /// Failure bundle under this store's key names.
    pub fn failure(&self, message: Value) -> Value {
        bundle::failure(&self.config.keys, message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::{FieldDescriptor, FieldKind, MemoryRecordStore, RecordType},
        remoting_query::Op,
        serde_json::json,
    };

    fn adapter(n: usize) -> StoreAdapter {
        let rt = RecordType::new("Person", "id", vec![
            FieldDescriptor::new("name", FieldKind::Text),
            FieldDescriptor::new("age", FieldKind::Integer),
        ]);
        let seed = (0..n)
            .map(|i| {
                json!({"name": format!("person {i}"), "age": i})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        let store = MemoryRecordStore::with_records(rt, seed).unwrap();
        StoreAdapter::new(Arc::new(store), StoreConfig::default())
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn identity_predicate_returns_everything_by_id_desc() {
        let page = adapter(5)
            .select(None, Predicate::True, vec![], None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(ids(&page), vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn start_past_end_yields_last_page() {
        let page = adapter(25)
            .select(None, Predicate::True, vec![], Some(1025), Some(10))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(ids(&page), vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn paging_and_zero_limit() {
        let adapter = adapter(25);
        let sort = vec![SortSpec::new("age", Direction::Asc)];
        let page = adapter
            .select(None, Predicate::True, sort.clone(), Some(10), Some(10))
            .await
            .unwrap();
        assert_eq!(ids(&page), (11..=20).collect::<Vec<_>>());
        let page = adapter
            .select(None, Predicate::True, sort, Some(10), Some(0))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 25);
    }

    #[tokio::test]
    async fn total_counts_filtered_set() {
        let predicate = Predicate::comparison("age", Op::Lt, json!(12));
        let page = adapter(25)
            .select(None, predicate, vec![], Some(0), Some(5))
            .await
            .unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.records.len(), 5);
    }

    #[tokio::test]
    async fn empty_base_collection_takes_precedence() {
        let base = Collection::with_ids("id", vec![]);
        let page = adapter(5)
            .select(Some(base), Predicate::True, vec![], None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn query_builds_bundle_from_params() {
        let params = json!({
            "filter": [{"property": "age__gte", "value": 3}],
            "sort": [{"property": "age", "direction": "ASC"}],
            "start": 0,
            "limit": 1,
        });
        let bundle = adapter(5)
            .query(None, params.as_object().unwrap(), &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(bundle["total"], 2);
        assert_eq!(bundle["records"][0]["age"], 3);
    }
}
