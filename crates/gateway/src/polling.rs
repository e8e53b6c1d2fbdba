//! Polling providers: one handler per event name, answered with an event
//! envelope instead of an RPC result.

use std::{collections::BTreeMap, sync::Arc};

use {
    remoting_protocol::{CallArgs, FormData, POLLING_PROVIDER_TYPE, PollEvent, RpcCall},
    serde_json::{Value, json},
    tracing::{error, warn},
};

use crate::{
    Error, Result,
    auth::AuthContext,
    dispatcher::authorize,
    handler::{ActionHandler, CallRequest, Outcome},
    registry::RegisteredAction,
};

#[derive(Default)]
pub struct PollingRegistry {
    providers: BTreeMap<String, RegisteredAction>,
}

impl PollingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `event`, replacing any previous one.
    pub fn register(
        &mut self,
        event: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
        requires_auth: bool,
        permission: Option<String>,
    ) {
        let event = event.into();
        let entry = RegisteredAction::new(POLLING_PROVIDER_TYPE, event.clone(), handler)
            .requires_auth(requires_auth)
            .permission(permission);
        self.providers.insert(event, entry);
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Answer one poll of `event` with the request parameters `params`.
    pub async fn poll(
        &self,
        event: &str,
        params: FormData,
        auth: Arc<dyn AuthContext>,
        debug: bool,
    ) -> Result<PollEvent> {
        let Some(entry) = self.providers.get(event) else {
            warn!(event, "poll for unregistered event");
            return Ok(PollEvent::exception(
                event,
                "The server provider didn't register a function to run yet",
                format!("{POLLING_PROVIDER_TYPE}.{event}"),
            ));
        };
        let call = RpcCall {
            action: entry.action.clone(),
            method: entry.method.clone(),
            tid: Value::Null,
            args: CallArgs::Form(params),
            upload: false,
        };
        let outcome = match authorize(entry, auth.as_ref()) {
            Some(message) => Outcome::AuthFailure(message),
            None => entry.handler.call(CallRequest::new(call, auth)).await,
        };
        match outcome {
            Outcome::Ok(data) => Ok(PollEvent::event(event, data)),
            Outcome::AuthFailure(message) => Ok(PollEvent::event(event, json!(message))),
            Outcome::ValidationFailure(errors) => Ok(PollEvent::event(
                event,
                json!({"success": false, "errors": errors}),
            )),
            Outcome::Fatal(err) if debug => {
                error!(event, error = ?err, "polling handler failed");
                Err(Error::Handler {
                    action: entry.action.clone(),
                    method: entry.method.clone(),
                    message: format!("{err:#}"),
                })
            },
            Outcome::Fatal(err) => {
                warn!(event, error = %err, "polling handler failed");
                Ok(PollEvent::exception(event, err.to_string(), entry.qualified_name()))
            },
        }
    }
}
