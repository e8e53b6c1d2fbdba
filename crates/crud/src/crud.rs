//! The five CRUD actions of one record type.

use std::sync::Arc;

use {
    anyhow::{Context, anyhow},
    remoting_gateway::{ActionRegistry, CallRequest, Outcome, RegisteredAction, handler_fn},
    remoting_query::{Predicate, lookup},
    remoting_store::{
        Collection, Error as StoreError, QueryOptions, Record, RecordStore, StoreAdapter,
        StoreKeys,
    },
    serde_json::{Map, Value, json},
    tracing::{debug, info},
};

use crate::{
    hooks::CrudHooks,
    normalize,
    options::{CrudAction, CrudOptions},
    savepoint::SavepointScope,
};

/// Client bookkeeping keys removed from read parameters.
const READ_BOOKKEEPING_KEYS: [&str; 3] = ["model", "meta", "fields"];
/// Read parameter selecting the field subset of one call.
const FIELDS_PARAM: &str = "fields";

/// Fixed key names of `load` bundles.
pub mod direct_load {
    pub const ROOT: &str = "data";
    pub const TOTAL: &str = "total";
    pub const SUCCESS: &str = "success";
}

#[derive(Clone, Copy)]
enum WriteKind {
    Create,
    Update,
}

/// Why a write batch stopped.
enum BatchError {
    /// Lookup or validation failure of one item; answered with a failure
    /// bundle.
    Item(StoreError),
    /// Anything else; answered with an exception.
    Fatal(anyhow::Error),
}

impl From<StoreError> for BatchError {
    fn from(e: StoreError) -> Self {
        if e.is_item_failure() {
            Self::Item(e)
        } else {
            Self::Fatal(e.into())
        }
    }
}

/// CRUD orchestration over a [`StoreAdapter`].
pub struct Crud {
    adapter: StoreAdapter,
    options: CrudOptions,
    hooks: Arc<dyn CrudHooks>,
}

impl Crud {
    pub fn new(adapter: StoreAdapter, options: CrudOptions, hooks: Arc<dyn CrudHooks>) -> Self {
        Self {
            adapter,
            options,
            hooks,
        }
    }

    pub fn adapter(&self) -> &StoreAdapter {
        &self.adapter
    }

    pub fn options(&self) -> &CrudOptions {
        &self.options
    }

    fn store(&self) -> &Arc<dyn RecordStore> {
        self.adapter.store()
    }

    fn keys(&self) -> &StoreKeys {
        &self.adapter.config().keys
    }

    /// Records payload of a write call: the form fields in form mode,
    /// otherwise `<root>` of the first argument.
    fn write_payload(&self, request: &CallRequest) -> anyhow::Result<Value> {
        if self.options.form_mode
            && let Some(form) = request.form()
        {
            return Ok(Value::Object(form.clone()));
        }
        let root = &self.keys().root;
        request
            .arg(0)
            .and_then(|arg| arg.get(root))
            .cloned()
            .ok_or_else(|| anyhow!("call payload lacks `{root}`"))
    }

    // ── create / update ──────────────────────────────────────────────────

    pub async fn create(&self, request: CallRequest) -> Outcome {
        self.write(request, WriteKind::Create).await
    }

    pub async fn update(&self, request: CallRequest) -> Outcome {
        self.write(request, WriteKind::Update).await
    }

    async fn write(&self, request: CallRequest, kind: WriteKind) -> Outcome {
        let payload = match self.write_payload(&request) {
            Ok(payload) => payload,
            Err(e) => return Outcome::Fatal(e),
        };
        let optional = self.hooks.extract_optional(&request);
        let optional = optional.as_ref();

        let veto = match kind {
            WriteKind::Create => self.hooks.pre_create(&request, &payload, optional).await,
            WriteKind::Update => self.hooks.pre_update(&request, &payload, optional).await,
        };
        if let Err(message) = veto {
            return Outcome::Ok(self.adapter.failure(message));
        }

        let scope = match SavepointScope::open(Arc::clone(self.store())).await {
            Ok(scope) => scope,
            Err(e) => return Outcome::Fatal(e.into()),
        };
        let items = match payload {
            Value::Array(items) => items,
            single => vec![single],
        };

        match self.write_items(&request, kind, items, optional).await {
            Ok(ids) => match self.written_bundle(kind, &ids).await {
                Ok(bundle) => match scope.commit().await {
                    Ok(()) => {
                        info!(record_type = %self.record_type_name(), count = ids.len(), "batch written");
                        Outcome::Ok(bundle)
                    },
                    Err(e) => Outcome::Fatal(e.into()),
                },
                Err(e) => rollback_then(scope, Outcome::Fatal(e)).await,
            },
            Err(BatchError::Item(e)) => {
                debug!(record_type = %self.record_type_name(), error = %e, "batch item failed, rolling back");
                let outcome = match e {
                    StoreError::Validation(errors)
                        if self.options.show_form_validation && request.call.is_form_submission() =>
                    {
                        Outcome::ValidationFailure(errors)
                    },
                    e => Outcome::Ok(self.adapter.failure(self.failure_message(kind, &e))),
                };
                rollback_then(scope, outcome).await
            },
            Err(BatchError::Fatal(e)) => rollback_then(scope, Outcome::Fatal(e)).await,
        }
    }

    /// Write items in order, stopping at the first failure.
    async fn write_items(
        &self,
        request: &CallRequest,
        kind: WriteKind,
        items: Vec<Value>,
        optional: Option<&Value>,
    ) -> Result<Vec<Value>, BatchError> {
        let record_type = self.store().record_type();
        let id_field = record_type.id_field.clone();
        let id_property = self.keys().id_property.clone();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let mut data = match item {
                Value::Object(data) => data,
                other => {
                    return Err(BatchError::Fatal(anyhow!(
                        "record payload must be an object, got {other}"
                    )));
                },
            };
            let written = match kind {
                WriteKind::Create => {
                    data = normalize::strip_identity(record_type, &id_property, data);
                    data = self.normalize(data);
                    let record = self.store().create(data).await?;
                    self.hooks.post_single_create(request, &record, optional).await;
                    record
                },
                WriteKind::Update => {
                    let id = data
                        .remove(&id_property)
                        .ok_or_else(|| StoreError::not_found(&record_type.name, Value::Null))?;
                    data = normalize::strip_identity(record_type, &id_property, data);
                    data = self.normalize(data);
                    let record = self.store().update(&id, data).await?;
                    self.hooks.post_single_update(request, &record, optional).await;
                    record
                },
            };
            ids.push(written.get(&id_field).cloned().unwrap_or(Value::Null));
        }
        match kind {
            WriteKind::Create => self.hooks.post_create(&ids, optional).await,
            WriteKind::Update => self.hooks.post_update(&ids, optional).await,
        }
        Ok(ids)
    }

    fn normalize(&self, data: Record) -> Record {
        if self.options.parse_relation_fields {
            normalize::relation_fields(self.store().record_type(), data)
        } else {
            data
        }
    }

    /// Fresh bundle of the written records plus the success message.
    async fn written_bundle(&self, kind: WriteKind, ids: &[Value]) -> anyhow::Result<Value> {
        let base = Collection::with_ids(&self.store().record_type().id_field, ids.to_vec());
        let page = self
            .adapter
            .select(Some(base), Predicate::True, Vec::new(), None, None)
            .await?;
        let mut bundle = self
            .adapter
            .serialize(page.records, page.total, &QueryOptions::default())?;
        let message = match kind {
            WriteKind::Create => &self.options.messages.create_success,
            WriteKind::Update => &self.options.messages.update_success,
        };
        if let Value::Object(map) = &mut bundle {
            map.insert(self.keys().message.clone(), json!(message));
        }
        Ok(bundle)
    }

    fn failure_message(&self, kind: WriteKind, error: &StoreError) -> Value {
        if self.options.show_form_validation {
            return match error {
                StoreError::Validation(errors) => json!(errors),
                other => {
                    let mut errors = Map::new();
                    errors.insert(self.keys().id_property.clone(), json!([other.to_string()]));
                    Value::Object(errors)
                },
            };
        }
        match kind {
            WriteKind::Create => json!(self.options.messages.create_failure),
            WriteKind::Update => json!(self.options.messages.update_failure),
        }
    }

    fn record_type_name(&self) -> &str {
        &self.store().record_type().name
    }

    // ── read / load ──────────────────────────────────────────────────────

    pub async fn read(&self, request: CallRequest) -> Outcome {
        let mut params = request.params();
        let fields = params.get(FIELDS_PARAM).and_then(field_subset);
        for key in READ_BOOKKEEPING_KEYS {
            params.remove(key);
        }
        let optional = self.hooks.extract_optional(&request);
        let optional = optional.as_ref();

        if let Err(message) = self.hooks.pre_read(&params, optional).await {
            return Outcome::Ok(self.adapter.failure(message));
        }
        let base = self.hooks.query(&request, optional, &params).await;
        let options = QueryOptions::default()
            .with_metadata(self.options.metadata)
            .with_columns(self.options.columns)
            .with_fields(fields);
        match self.adapter.query(base, &params, &options).await {
            Ok(bundle) => Outcome::Ok(bundle),
            Err(StoreError::Query(e)) => Outcome::Ok(self.adapter.failure(json!(e.to_string()))),
            Err(e) => Outcome::Fatal(e.into()),
        }
    }

    /// Single-record fetch by exact-match criteria, answered with the fixed
    /// direct-load key names.
    pub async fn load(&self, request: CallRequest) -> Outcome {
        let params = request.params();
        let optional = self.hooks.extract_optional(&request);
        if let Err(message) = self.hooks.pre_load(&params, optional.as_ref()).await {
            return Outcome::Ok(self.adapter.failure(message));
        }
        let predicate = Predicate::and(
            params
                .iter()
                .map(|(property, value)| lookup(property, value.clone())),
        );
        self.load_bundle(Collection::all().filter(predicate))
            .await
            .into()
    }

    async fn load_bundle(&self, collection: Collection) -> anyhow::Result<Value> {
        let total = self.store().count(&collection).await?;
        let mut records = self.store().fetch(&collection.page(0, 1)).await?;
        let data = match records.pop() {
            Some(record) => {
                let bundle = self
                    .adapter
                    .serialize(vec![record], 1, &QueryOptions::default())?;
                bundle
                    .get(&self.keys().root)
                    .and_then(|records| records.get(0))
                    .cloned()
                    .context("serialized bundle lacks its record")?
            },
            None => Value::Null,
        };
        let mut bundle = Map::new();
        bundle.insert(direct_load::SUCCESS.into(), json!(total > 0));
        bundle.insert(direct_load::TOTAL.into(), json!(total));
        bundle.insert(direct_load::ROOT.into(), data);
        Ok(Value::Object(bundle))
    }

    // ── destroy ──────────────────────────────────────────────────────────

    pub async fn destroy(&self, request: CallRequest) -> Outcome {
        let payload = match self.write_payload(&request) {
            Ok(payload) => payload,
            Err(e) => return Outcome::Fatal(e),
        };
        let id_property = self.keys().id_property.clone();
        let identity = |item: &Value| match item {
            Value::Object(map) => map.get(&id_property).cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let ids = match &payload {
            Value::Array(items) => Value::Array(items.iter().map(identity).collect()),
            single => identity(single),
        };
        let optional = self.hooks.extract_optional(&request);
        let optional = optional.as_ref();
        if let Err(message) = self.hooks.pre_destroy(&ids, optional).await {
            return Outcome::Ok(self.adapter.failure(message));
        }

        let result = self.delete_all(ids, optional).await;
        match result {
            Ok(()) => {
                let keys = self.keys();
                let mut bundle = Map::new();
                bundle.insert(keys.success.clone(), json!(true));
                bundle.insert(keys.message.clone(), json!(self.options.messages.destroy_success));
                bundle.insert(keys.root.clone(), json!([]));
                Outcome::Ok(Value::Object(bundle))
            },
            Err(e) => Outcome::Fatal(e),
        }
    }

    /// Delete every listed identity that exists, or the single identity,
    /// which must exist.
    async fn delete_all(&self, ids: Value, optional: Option<&Value>) -> anyhow::Result<()> {
        let _writes = self.store().lock_writes().await;
        let id_field = &self.store().record_type().id_field;
        let targets = match ids {
            Value::Array(ids) => self
                .store()
                .fetch(&Collection::with_ids(id_field, ids))
                .await?
                .into_iter()
                .filter_map(|record| record.get(id_field).cloned())
                .collect(),
            single => vec![single],
        };
        for id in targets {
            self.store().delete(&id).await?;
            self.hooks.post_destroy(&id, optional).await;
        }
        Ok(())
    }

    async fn run(&self, action: CrudAction, request: CallRequest) -> Outcome {
        match action {
            CrudAction::Create => self.create(request).await,
            CrudAction::Read => self.read(request).await,
            CrudAction::Load => self.load(request).await,
            CrudAction::Update => self.update(request).await,
            CrudAction::Destroy => self.destroy(request).await,
        }
    }
}

async fn rollback_then(scope: SavepointScope, outcome: Outcome) -> Outcome {
    match scope.rollback().await {
        Ok(()) => outcome,
        Err(e) => Outcome::Fatal(e.into()),
    }
}

fn field_subset(value: &Value) -> Option<Vec<String>> {
    let names: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    (!names.is_empty()).then_some(names)
}

/// Register the enabled actions of `crud` under `action` as ordinary
/// registry entries. Create and update are form handlers in form mode.
pub fn register_crud(registry: &mut ActionRegistry, action: &str, crud: Arc<Crud>) {
    for method in CrudAction::ALL {
        if !crud.options.enables(method) {
            continue;
        }
        let form_handler =
            crud.options.form_mode && matches!(method, CrudAction::Create | CrudAction::Update);
        let handler_crud = Arc::clone(&crud);
        let handler = handler_fn(move |request: CallRequest| {
            let crud = Arc::clone(&handler_crud);
            async move { crud.run(method, request).await }
        });
        registry.register(
            RegisteredAction::new(action, method.as_str(), handler)
                .arity(1)
                .form_handler(form_handler)
                .requires_auth(crud.options.requires_auth)
                .permission(crud.options.permission.clone()),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        crate::{hooks::Veto, options::CrudOptions},
        async_trait::async_trait,
        remoting_gateway::{auth::Anonymous, dispatcher::Dispatcher},
        remoting_protocol::{CallArgs, RpcCall},
        remoting_query::Op,
        remoting_store::{FieldDescriptor, FieldKind, MemoryRecordStore, RecordType, StoreConfig},
    };

    fn book_type() -> RecordType {
        RecordType::new("Book", "id", vec![
            FieldDescriptor::new("title", FieldKind::Text),
            FieldDescriptor::new("pages", FieldKind::Integer).with_default(json!(0)),
            FieldDescriptor::new("author", FieldKind::RelationToOne).nullable(),
        ])
    }

    fn seeded_store() -> Arc<dyn RecordStore> {
        let seed = ["Dune", "Emma", "Ubik"]
            .iter()
            .enumerate()
            .map(|(i, title)| {
                json!({"title": title, "pages": 100 * (i + 1)})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect();
        Arc::new(MemoryRecordStore::with_records(book_type(), seed).unwrap())
    }

    fn crud_with(store: Arc<dyn RecordStore>, options: CrudOptions, hooks: Arc<dyn CrudHooks>) -> Crud {
        let adapter = StoreAdapter::new(store, StoreConfig::default().with_metadata(true));
        Crud::new(adapter, options, hooks)
    }

    fn crud(store: Arc<dyn RecordStore>) -> Crud {
        crud_with(store, CrudOptions::default(), Arc::new(crate::NoHooks))
    }

    fn call(method: &str, arg: Value) -> CallRequest {
        CallRequest::new(
            RpcCall {
                action: "Books".into(),
                method: method.into(),
                tid: json!(1),
                args: CallArgs::Positional(Some(vec![arg])),
                upload: false,
            },
            Arc::new(Anonymous),
        )
    }

    fn ok(outcome: Outcome) -> Value {
        match outcome {
            Outcome::Ok(value) => value,
            other => panic!("expected Ok outcome, got {other:?}"),
        }
    }

    async fn titles(store: &Arc<dyn RecordStore>) -> Vec<String> {
        let mut titles: Vec<String> = store
            .fetch(&Collection::all())
            .await
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap().to_string())
            .collect();
        titles.sort();
        titles
    }

    #[tokio::test]
    async fn create_batch_returns_fresh_bundle() {
        let store = seeded_store();
        let bundle = ok(crud(Arc::clone(&store))
            .create(call(
                "create",
                json!({"records": [
                    {"id": "ext-record-1", "title": "Solaris", "pages": "204"},
                    {"title": "Kindred", "author_id": 7},
                ]}),
            ))
            .await);
        assert_eq!(bundle["success"], true);
        assert_eq!(bundle["total"], 2);
        assert_eq!(bundle["message"], "Records created");
        assert!(bundle.get("metaData").is_none());
        let records = bundle["records"].as_array().unwrap();
        assert_eq!(records[0]["title"], "Kindred");
        assert_eq!(records[0]["author"], 7);
        assert_eq!(records[1]["pages"], 204);
        assert_eq!(titles(&store).await.len(), 5);
    }

    #[tokio::test]
    async fn failing_item_rolls_back_whole_batch() {
        struct Counting(Mutex<Vec<String>>);

        #[async_trait]
        impl CrudHooks for Counting {
            async fn post_single_create(&self, _: &CallRequest, record: &Record, _: Option<&Value>) {
                let title = record["title"].as_str().unwrap_or_default().to_string();
                self.0.lock().unwrap().push(title);
            }
        }

        let store = seeded_store();
        let hooks = Arc::new(Counting(Mutex::new(Vec::new())));
        let crud = crud_with(Arc::clone(&store), CrudOptions::default(), hooks.clone());
        let bundle = ok(crud
            .create(call(
                "create",
                json!({"records": [
                    {"title": "First"},
                    {"title": "Second", "pages": "many"},
                    {"title": "Third"},
                ]}),
            ))
            .await);
        assert_eq!(bundle["success"], false);
        assert_eq!(bundle["total"], 0);
        assert_eq!(bundle["records"], json!([]));
        assert_eq!(
            bundle["message"],
            "There was an error while trying to save some of the records"
        );
        assert_eq!(titles(&store).await, vec!["Dune", "Emma", "Ubik"]);
        assert_eq!(*hooks.0.lock().unwrap(), vec!["First".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_batches_keep_each_others_writes() {
        struct Slow;

        #[async_trait]
        impl CrudHooks for Slow {
            async fn post_single_create(&self, _: &CallRequest, _: &Record, _: Option<&Value>) {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }

        let store = seeded_store();
        let failing = crud_with(Arc::clone(&store), CrudOptions::default(), Arc::new(Slow));
        let succeeding = crud(Arc::clone(&store));
        let (failed, written) = tokio::join!(
            failing.create(call(
                "create",
                json!({"records": [{"title": "Lost"}, {"title": "Broken", "pages": "many"}]}),
            )),
            succeeding.create(call("create", json!({"records": [{"title": "Kept"}]}))),
        );
        assert_eq!(ok(failed)["success"], false);
        assert_eq!(ok(written)["success"], true);
        assert_eq!(titles(&store).await, vec!["Dune", "Emma", "Kept", "Ubik"]);
    }

    #[tokio::test]
    async fn form_validation_errors_are_shown_when_enabled() {
        let options = CrudOptions {
            show_form_validation: true,
            ..CrudOptions::default()
        };
        let crud = crud_with(seeded_store(), options, Arc::new(crate::NoHooks));
        let bundle = ok(crud.create(call("create", json!({"records": {"pages": 3}}))).await);
        assert_eq!(bundle["success"], false);
        assert_eq!(bundle["message"]["title"][0], "This field is required.");
    }

    #[tokio::test]
    async fn form_submission_reports_field_errors() {
        let options = CrudOptions {
            form_mode: true,
            show_form_validation: true,
            ..CrudOptions::default()
        };
        let mut registry = ActionRegistry::new();
        register_crud(
            &mut registry,
            "Books",
            Arc::new(crud_with(seeded_store(), options, Arc::new(crate::NoHooks))),
        );
        let dispatcher = Dispatcher::new(Arc::new(registry));
        let request =
            remoting_gateway::dispatcher::decode_form(b"extAction=Books&extMethod=create&extTID=2&pages=many").unwrap();
        let body = dispatcher.dispatch(request, Arc::new(Anonymous)).await.unwrap();
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["result"]["success"], false);
        assert_eq!(value["result"]["errors"]["pages"][0], "Enter a whole number.");
        assert_eq!(value["result"]["errors"]["title"][0], "This field is required.");
    }

    #[tokio::test]
    async fn update_merges_and_reports() {
        let store = seeded_store();
        let bundle = ok(crud(Arc::clone(&store))
            .update(call("update", json!({"records": {"id": 1, "pages": 999}})))
            .await);
        assert_eq!(bundle["message"], "Records updated");
        assert_eq!(bundle["records"][0]["title"], "Dune");
        assert_eq!(bundle["records"][0]["pages"], 999);
    }

    #[tokio::test]
    async fn update_of_missing_record_fails_and_rolls_back() {
        let store = seeded_store();
        let bundle = ok(crud(Arc::clone(&store))
            .update(call(
                "update",
                json!({"records": [{"id": 2, "title": "Changed"}, {"id": 42, "title": "Ghost"}]}),
            ))
            .await);
        assert_eq!(bundle["success"], false);
        assert_eq!(store.get(&json!(2)).await.unwrap()["title"], "Emma");

        let bundle = ok(crud(Arc::clone(&store))
            .update(call("update", json!({"records": {"title": "No id"}})))
            .await);
        assert_eq!(bundle["success"], false);
    }

    #[tokio::test]
    async fn read_pages_sorts_and_attaches_metadata() {
        let bundle = ok(crud(seeded_store())
            .read(call(
                "read",
                json!({
                    "start": 0, "limit": 2,
                    "sort": [{"property": "pages", "direction": "ASC"}],
                    "model": "Book", "meta": true,
                }),
            ))
            .await);
        assert_eq!(bundle["total"], 3);
        let titles: Vec<_> = bundle["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("Dune"), json!("Emma")]);
        assert_eq!(bundle["metaData"]["idProperty"], "id");
    }

    #[tokio::test]
    async fn read_field_subset_and_query_search() {
        let bundle = ok(crud(seeded_store())
            .read(call("read", json!({"query": "ub", "fields": ["title"]})))
            .await);
        assert_eq!(bundle["records"], json!([{"id": 3, "title": "Ubik"}]));
        let fields = bundle["metaData"]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[tokio::test]
    async fn read_with_bad_filter_is_failure_bundle() {
        let bundle = ok(crud(seeded_store())
            .read(call(
                "read",
                json!({"filter": {"property": "queryfilter", "value": {"pages": {"$near": 3}}}}),
            ))
            .await);
        assert_eq!(bundle["success"], false);
        assert_eq!(bundle["message"], "unsupported comparison operator $near");
    }

    #[tokio::test]
    async fn read_respects_hook_scope_and_veto() {
        struct Scoped;

        #[async_trait]
        impl CrudHooks for Scoped {
            async fn query(
                &self,
                _: &CallRequest,
                _: Option<&Value>,
                _: &Map<String, Value>,
            ) -> Option<Collection> {
                Some(Collection::scoped(Predicate::comparison("pages", Op::Gte, json!(200))))
            }

            async fn pre_read(&self, params: &Map<String, Value>, _: Option<&Value>) -> Veto {
                match params.get("forbidden") {
                    Some(_) => Err(json!("not allowed")),
                    None => Ok(()),
                }
            }
        }

        let crud = crud_with(seeded_store(), CrudOptions::default(), Arc::new(Scoped));
        let bundle = ok(crud.read(call("read", json!({}))).await);
        assert_eq!(bundle["total"], 2);
        let bundle = ok(crud.read(call("read", json!({"forbidden": 1}))).await);
        assert_eq!(bundle["success"], false);
        assert_eq!(bundle["message"], "not allowed");
    }

    #[tokio::test]
    async fn load_uses_direct_load_keys() {
        let bundle = ok(crud(seeded_store()).load(call("load", json!({"id": 2}))).await);
        assert_eq!(bundle["success"], true);
        assert_eq!(bundle["total"], 1);
        assert_eq!(bundle["data"]["title"], "Emma");

        let bundle = ok(crud(seeded_store()).load(call("load", json!({"id": 99}))).await);
        assert_eq!(bundle["success"], false);
        assert_eq!(bundle["data"], Value::Null);
    }

    #[tokio::test]
    async fn destroy_list_skips_missing_and_fires_hooks() {
        struct Deleted(Mutex<Vec<Value>>);

        #[async_trait]
        impl CrudHooks for Deleted {
            async fn post_destroy(&self, id: &Value, _: Option<&Value>) {
                self.0.lock().unwrap().push(id.clone());
            }
        }

        let store = seeded_store();
        let hooks = Arc::new(Deleted(Mutex::new(Vec::new())));
        let crud = crud_with(Arc::clone(&store), CrudOptions::default(), hooks.clone());
        let bundle = ok(crud
            .destroy(call("destroy", json!({"records": [{"id": 1}, {"id": 77}, 3]})))
            .await);
        assert_eq!(bundle, json!({"success": true, "message": "Objects deleted", "records": []}));
        assert_eq!(titles(&store).await, vec!["Emma"]);
        let mut deleted = hooks.0.lock().unwrap().clone();
        deleted.sort_by_key(|v| v.as_i64());
        assert_eq!(deleted, vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn destroy_of_missing_single_identity_is_fatal() {
        let outcome = crud(seeded_store())
            .destroy(call("destroy", json!({"records": {"id": 77}})))
            .await;
        assert!(matches!(outcome, Outcome::Fatal(_)));
    }

    #[tokio::test]
    async fn registration_through_dispatcher() {
        let mut registry = ActionRegistry::new();
        let options = CrudOptions {
            actions: vec![CrudAction::Read, CrudAction::Create],
            form_mode: true,
            ..CrudOptions::default()
        };
        register_crud(
            &mut registry,
            "Books",
            Arc::new(crud_with(seeded_store(), options, Arc::new(crate::NoHooks))),
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("Books", "create").unwrap().form_handler);
        assert!(!registry.resolve("Books", "read").unwrap().form_handler);
        assert!(registry.resolve("Books", "destroy").is_none());

        let dispatcher = Dispatcher::new(Arc::new(registry));
        let request = remoting_gateway::dispatcher::decode_form(b"extAction=Books&extMethod=create&extTID=5&title=Solaris").unwrap();
        let body = dispatcher.dispatch(request, Arc::new(Anonymous)).await.unwrap();
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["type"], "rpc-result");
        assert_eq!(value["result"]["records"][0]["title"], "Solaris");
    }
}
