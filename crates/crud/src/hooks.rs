//! Extension points around each CRUD action.
//!
//! Every hook has a permissive default. A `pre_*` hook returning
//! `Err(message)` vetoes the action, which then answers with a failure
//! bundle carrying `message`.

use {
    async_trait::async_trait,
    remoting_gateway::CallRequest,
    remoting_store::{Collection, Record},
    serde_json::{Map, Value},
};

/// Outcome of a `pre_*` hook.
pub type Veto = Result<(), Value>;

#[async_trait]
pub trait CrudHooks: Send + Sync {
    /// Base collection for `read`, e.g. a per-caller visibility scope.
    /// `None` reads from every record.
    async fn query(
        &self,
        _request: &CallRequest,
        _optional: Option<&Value>,
        _params: &Map<String, Value>,
    ) -> Option<Collection> {
        None
    }

    /// Extra request data handed to every other hook.
    fn extract_optional(&self, _request: &CallRequest) -> Option<Value> {
        None
    }

    async fn pre_create(&self, _request: &CallRequest, _data: &Value, _optional: Option<&Value>) -> Veto {
        Ok(())
    }

    async fn pre_read(&self, _params: &Map<String, Value>, _optional: Option<&Value>) -> Veto {
        Ok(())
    }

    async fn pre_load(&self, _params: &Map<String, Value>, _optional: Option<&Value>) -> Veto {
        Ok(())
    }

    async fn pre_update(&self, _request: &CallRequest, _data: &Value, _optional: Option<&Value>) -> Veto {
        Ok(())
    }

    async fn pre_destroy(&self, _ids: &Value, _optional: Option<&Value>) -> Veto {
        Ok(())
    }

    async fn post_single_create(&self, _request: &CallRequest, _record: &Record, _optional: Option<&Value>) {}

    async fn post_create(&self, _ids: &[Value], _optional: Option<&Value>) {}

    async fn post_single_update(&self, _request: &CallRequest, _record: &Record, _optional: Option<&Value>) {}

    async fn post_update(&self, _ids: &[Value], _optional: Option<&Value>) {}

    /// Called once per deleted record.
    async fn post_destroy(&self, _id: &Value, _optional: Option<&Value>) {}
}

/// Hooks that never veto and do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl CrudHooks for NoHooks {}
