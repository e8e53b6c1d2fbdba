//! Batch routing: decode → resolve → authorize → invoke → encode.

use std::sync::Arc;

use {
    remoting_protocol::{
        CallArgs, FormData, RequestBody, ResponseBody, ResponseEnvelope, RpcCall, form_fields,
    },
    serde_json::{Value, json},
    tracing::{debug, error, warn},
};

use crate::{
    Error, Result,
    auth::AuthContext,
    handler::{CallRequest, Outcome},
    registry::{ActionRegistry, RegisteredAction},
};

pub const UNAUTHENTICATED_MESSAGE: &str = "You must be authenticated to run this method.";

pub fn missing_permission_message(permission: &str) -> String {
    format!("You need `{permission}` permission to run this method")
}

/// A decoded transport request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Single(RpcCall),
    Batch(Vec<RpcCall>),
}

impl Decoded {
    /// Whether the response must use the upload (`text/html`) convention.
    pub fn is_upload(&self) -> bool {
        matches!(self, Self::Single(call) if call.upload)
    }
}

/// Decode a JSON body: one call envelope or an array of them.
pub fn decode_json(body: &[u8]) -> Result<Decoded> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::bad_request("empty request body"));
    }
    let body: RequestBody = serde_json::from_slice(body)
        .map_err(|e| Error::bad_request(format!("invalid call envelope: {e}")))?;
    Ok(match body {
        RequestBody::Single(envelope) => Decoded::Single(envelope.into()),
        RequestBody::Batch(envelopes) => {
            Decoded::Batch(envelopes.into_iter().map(RpcCall::from).collect())
        },
    })
}

/// Parse an `application/x-www-form-urlencoded` body. Repeated fields
/// become arrays of strings.
pub fn parse_form(body: &[u8]) -> FormData {
    let mut data = FormData::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match data.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            },
            None => {
                data.insert(key.into_owned(), value);
            },
        }
    }
    data
}

/// Decode a form submission. The reserved routing fields are removed from
/// the form data handed to the handler.
pub fn decode_form(body: &[u8]) -> Result<Decoded> {
    let (routing, data): (FormData, FormData) = parse_form(body)
        .into_iter()
        .partition(|(name, _)| form_fields::is_reserved(name));
    let field = |name: &str| routing.get(name).and_then(Value::as_str);
    let (Some(action), Some(method)) = (field(form_fields::ACTION), field(form_fields::METHOD)) else {
        return Err(Error::bad_request(format!(
            "form submission lacks {} or {}",
            form_fields::ACTION,
            form_fields::METHOD
        )));
    };
    let tid = match field(form_fields::TID) {
        Some(text) => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        None => Value::Null,
    };
    let upload = field(form_fields::UPLOAD).is_some_and(|v| v.eq_ignore_ascii_case("true"));
    Ok(Decoded::Single(RpcCall {
        action: action.to_string(),
        method: method.to_string(),
        tid,
        args: CallArgs::Form(data),
        upload,
    }))
}

/// Routes decoded calls to registered handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    debug: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            debug: false,
        }
    }

    /// In debug mode handler failures are also returned as
    /// [`Error::Handler`] after being logged.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Dispatch every call in input order. Each call's side effects are
    /// visible to the calls after it.
    pub async fn dispatch(&self, request: Decoded, auth: Arc<dyn AuthContext>) -> Result<ResponseBody> {
        Ok(match request {
            Decoded::Single(call) => ResponseBody::Single(self.dispatch_call(call, auth).await?),
            Decoded::Batch(calls) => {
                let mut responses = Vec::with_capacity(calls.len());
                for call in calls {
                    responses.push(self.dispatch_call(call, Arc::clone(&auth)).await?);
                }
                ResponseBody::Batch(responses)
            },
        })
    }

    pub async fn dispatch_call(&self, call: RpcCall, auth: Arc<dyn AuthContext>) -> Result<ResponseEnvelope> {
        let Some(entry) = self.registry.resolve(&call.action, &call.method) else {
            warn!(action = %call.action, method = %call.method, "unknown remoting method");
            let message = format!("method {}.{} is not registered", call.action, call.method);
            let location = format!("{}.{}", call.action, call.method);
            return Ok(ResponseEnvelope::exception(&call, message, location));
        };

        let outcome = match authorize(entry, auth.as_ref()) {
            Some(message) => {
                debug!(action = %call.action, method = %call.method, "call rejected by authorization");
                Outcome::AuthFailure(message)
            },
            None => {
                let handler = Arc::clone(&entry.handler);
                handler.call(CallRequest::new(call.clone(), auth)).await
            },
        };
        match outcome {
            Outcome::Ok(value) => Ok(ResponseEnvelope::result(&call, value)),
            Outcome::AuthFailure(message) => Ok(ResponseEnvelope::result(
                &call,
                json!({"success": false, "message": message}),
            )),
            Outcome::ValidationFailure(errors) => Ok(ResponseEnvelope::result(
                &call,
                json!({"success": false, "errors": errors}),
            )),
            Outcome::Fatal(err) => self.fatal(entry, &call, err),
        }
    }

    fn fatal(&self, entry: &RegisteredAction, call: &RpcCall, err: anyhow::Error) -> Result<ResponseEnvelope> {
        let message = err.to_string();
        let location = exception_location(entry, &err);
        if self.debug {
            error!(action = %entry.action, method = %entry.method, error = ?err, "handler failed");
            return Err(Error::Handler {
                action: entry.action.clone(),
                method: entry.method.clone(),
                message: format!("{err:#}"),
            });
        }
        warn!(action = %entry.action, method = %entry.method, error = %message, "handler failed");
        Ok(ResponseEnvelope::exception(call, message, location))
    }
}

/// Failure message for a call the caller may not make, if any.
pub fn authorize(entry: &RegisteredAction, auth: &dyn AuthContext) -> Option<String> {
    if entry.requires_auth && !auth.is_authenticated() {
        return Some(UNAUTHENTICATED_MESSAGE.to_string());
    }
    match &entry.permission {
        Some(permission) if !auth.has_permission(permission) => Some(missing_permission_message(permission)),
        _ => None,
    }
}

/// `action.method`, followed by the innermost cause when the error has a
/// chain.
fn exception_location(entry: &RegisteredAction, err: &anyhow::Error) -> String {
    let name = entry.qualified_name();
    if err.chain().count() > 1 {
        format!("{name}: {}", err.root_cause())
    } else {
        name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::{
            auth::{Anonymous, Principal},
            handler::handler_fn,
        },
        anyhow::Context,
        remoting_protocol::envelope_types,
        remoting_store::FieldErrors,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    fn registry() -> Arc<ActionRegistry> {
        let mut registry = ActionRegistry::new();
        registry.register(
            RegisteredAction::new(
                "Math",
                "add",
                handler_fn(|req: CallRequest| async move {
                    let sum: i64 = req.args().iter().filter_map(Value::as_i64).sum();
                    Outcome::Ok(json!(sum))
                }),
            )
            .arity(2),
        );
        registry.register(
            RegisteredAction::new(
                "Math",
                "secret",
                handler_fn(|_| async { Outcome::Ok(json!("42")) }),
            )
            .requires_auth(true),
        );
        registry.register(
            RegisteredAction::new(
                "Math",
                "admin",
                handler_fn(|_| async { Outcome::Ok(json!("ok")) }),
            )
            .permission(Some("math.admin".into())),
        );
        registry.register(RegisteredAction::new(
            "Math",
            "explode",
            handler_fn(|_| async {
                let err = Err::<(), _>(std::io::Error::other("disk on fire"))
                    .context("could not compute")
                    .unwrap_err();
                Outcome::Fatal(err)
            }),
        ));
        registry.register(RegisteredAction::new(
            "Math",
            "validate",
            handler_fn(|_| async {
                let mut errors = FieldErrors::new();
                errors.insert("x".into(), vec!["This field is required.".into()]);
                Outcome::ValidationFailure(errors)
            }),
        ));
        registry.register(
            RegisteredAction::new(
                "Forms",
                "submit",
                handler_fn(|req: CallRequest| async move { Outcome::Ok(Value::Object(req.params())) }),
            )
            .form_handler(true),
        );
        Arc::new(registry)
    }

    fn anonymous() -> Arc<dyn AuthContext> {
        Arc::new(Anonymous)
    }

    fn single(body: ResponseBody) -> ResponseEnvelope {
        match body {
            ResponseBody::Single(envelope) => envelope,
            ResponseBody::Batch(_) => panic!("expected a single envelope"),
        }
    }

    fn batch(body: ResponseBody) -> Vec<ResponseEnvelope> {
        match body {
            ResponseBody::Batch(envelopes) => envelopes,
            ResponseBody::Single(_) => panic!("expected a batch"),
        }
    }

    #[tokio::test]
    async fn single_call_is_unwrapped() {
        let request = decode_json(br#"{"action":"Math","method":"add","tid":7,"type":"rpc","data":[2,3]}"#).unwrap();
        let envelope = single(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        assert_eq!(envelope.r#type, envelope_types::RESULT);
        assert_eq!(envelope.tid, json!(7));
        assert_eq!(envelope.result, Some(json!(5)));
    }

    #[tokio::test]
    async fn unknown_method_only_fails_its_call() {
        let request = decode_json(
            br#"[{"action":"Math","method":"nope","tid":1,"data":null},
                {"action":"Math","method":"add","tid":2,"data":[1,1]}]"#,
        )
        .unwrap();
        let envelopes = batch(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        assert_eq!(envelopes.len(), 2);
        assert!(envelopes[0].is_exception());
        assert_eq!(envelopes[0].tid, json!(1));
        assert_eq!(envelopes[1].result, Some(json!(2)));
    }

    #[tokio::test]
    async fn unauthenticated_call_gets_result_failure() {
        let request = decode_json(br#"{"action":"Math","method":"secret","tid":1}"#).unwrap();
        let envelope = single(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        assert_eq!(envelope.r#type, envelope_types::RESULT);
        let result = envelope.result.unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["message"], UNAUTHENTICATED_MESSAGE);
    }

    #[tokio::test]
    async fn missing_permission_gets_result_failure() {
        let dispatcher = Dispatcher::new(registry());
        let request = decode_json(br#"{"action":"Math","method":"admin","tid":1}"#).unwrap();
        let user: Arc<dyn AuthContext> = Arc::new(Principal::new(["other"]));
        let envelope = single(dispatcher.dispatch(request.clone(), user).await.unwrap());
        assert_eq!(
            envelope.result.unwrap()["message"],
            "You need `math.admin` permission to run this method"
        );
        let admin: Arc<dyn AuthContext> = Arc::new(Principal::new(["math.admin"]));
        let envelope = single(dispatcher.dispatch(request, admin).await.unwrap());
        assert_eq!(envelope.result, Some(json!("ok")));
    }

    #[tokio::test]
    async fn validation_failure_carries_errors() {
        let request = decode_json(br#"{"action":"Math","method":"validate","tid":1}"#).unwrap();
        let envelope = single(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        let result = envelope.result.unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["errors"]["x"][0], "This field is required.");
    }

    #[tokio::test]
    async fn fatal_becomes_exception_in_production() {
        let request = decode_json(br#"{"action":"Math","method":"explode","tid":3}"#).unwrap();
        let envelope = single(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        assert!(envelope.is_exception());
        assert_eq!(envelope.message.as_deref(), Some("could not compute"));
        assert_eq!(envelope.location.as_deref(), Some("Math.explode: disk on fire"));
    }

    #[tokio::test]
    async fn fatal_is_reraised_in_debug() {
        let request = decode_json(br#"{"action":"Math","method":"explode","tid":3}"#).unwrap();
        let err = Dispatcher::new(registry())
            .with_debug(true)
            .dispatch(request, anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Handler { ref method, .. } if method == "explode"));
    }

    #[tokio::test]
    async fn batch_runs_in_input_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionRegistry::new();
        let seen = Arc::clone(&counter);
        registry.register(RegisteredAction::new(
            "Seq",
            "next",
            handler_fn(move |_| {
                let seen = Arc::clone(&seen);
                async move { Outcome::Ok(json!(seen.fetch_add(1, Ordering::SeqCst))) }
            }),
        ));
        let request = decode_json(
            br#"[{"action":"Seq","method":"next","tid":1},
                {"action":"Seq","method":"next","tid":2},
                {"action":"Seq","method":"next","tid":3}]"#,
        )
        .unwrap();
        let envelopes = batch(Dispatcher::new(Arc::new(registry)).dispatch(request, anonymous()).await.unwrap());
        let results: Vec<_> = envelopes.iter().map(|e| e.result.clone().unwrap()).collect();
        assert_eq!(results, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(envelopes[2].tid, json!(3));
    }

    #[tokio::test]
    async fn form_submission_strips_routing_fields() {
        let request = decode_form(
            b"extAction=Forms&extMethod=submit&extTID=4&extType=rpc&extUpload=false&title=Dune&tag=a&tag=b",
        )
        .unwrap();
        assert!(!request.is_upload());
        let envelope = single(Dispatcher::new(registry()).dispatch(request, anonymous()).await.unwrap());
        assert_eq!(envelope.tid, json!(4));
        assert_eq!(envelope.result, Some(json!({"title": "Dune", "tag": ["a", "b"]})));
    }

    #[test]
    fn malformed_bodies_are_bad_requests() {
        assert!(matches!(decode_json(b""), Err(Error::BadRequest(_))));
        assert!(matches!(decode_json(b"42"), Err(Error::BadRequest(_))));
        assert!(matches!(decode_json(b"{\"tid\": 1}"), Err(Error::BadRequest(_))));
        assert!(matches!(decode_form(b"title=Dune"), Err(Error::BadRequest(_))));
    }

    #[test]
    fn upload_flag_is_detected() {
        let request = decode_form(b"extAction=Forms&extMethod=submit&extTID=1&extUpload=true").unwrap();
        assert!(request.is_upload());
    }
}
