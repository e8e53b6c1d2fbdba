//! Remoting wire protocol definitions.
//!
//! A transport request carries either one call envelope, a JSON array of call
//! envelopes (a batch), or a single form-encoded call. Every call is answered
//! by exactly one response envelope, in input order.
//!
//! Envelope types:
//! - `CallEnvelope`     — client → server RPC call (JSON body)
//! - `ResponseEnvelope` — server → client result or exception
//! - `PollEvent`        — server → client answer to a polling provider

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

/// Provider type advertised by the remoting descriptor.
pub const REMOTING_PROVIDER_TYPE: &str = "remoting";
/// Provider type advertised by polling providers.
pub const POLLING_PROVIDER_TYPE: &str = "polling";

pub mod envelope_types {
    /// Type sent by clients on every call envelope.
    pub const RPC: &str = "rpc";
    pub const RESULT: &str = "rpc-result";
    pub const EXCEPTION: &str = "exception";
    pub const EVENT: &str = "event";
}

/// Reserved form field names used by form-submission calls.
pub mod form_fields {
    pub const ACTION: &str = "extAction";
    pub const METHOD: &str = "extMethod";
    pub const TID: &str = "extTID";
    pub const TYPE: &str = "extType";
    pub const UPLOAD: &str = "extUpload";

    pub const ALL: &[&str] = &[ACTION, METHOD, TID, TYPE, UPLOAD];

    /// Whether `name` is one of the reserved routing fields.
    pub fn is_reserved(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Fixed HTTP paths served next to the configurable router url.
pub mod routes {
    pub const API: &str = "/api";
    pub const PROVIDER_SCRIPT: &str = "/provider.js";
    pub const HEALTH: &str = "/health";
    /// Polling providers live under `/polling/{event}`.
    pub const POLLING: &str = "/polling";

    pub const FIXED: &[&str] = &[API, PROVIDER_SCRIPT, HEALTH];

    /// Why `url` cannot be mounted as the router endpoint, if it cannot.
    pub fn router_url_problem(url: &str) -> Option<&'static str> {
        if !url.starts_with('/') {
            return Some("must start with `/`");
        }
        if url.contains(['{', '}', '*', '?', '#']) || url.contains("//") {
            return Some("must be a literal path");
        }
        let trimmed = url.trim_end_matches('/');
        if FIXED.contains(&trimmed) {
            return Some("clashes with a built-in route");
        }
        if trimmed == POLLING || trimmed.starts_with("/polling/") {
            return Some("clashes with the polling routes");
        }
        None
    }
}

// ── Calls ────────────────────────────────────────────────────────────────────

/// Client → server call envelope as it appears in a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub action: String,
    pub method: String,
    /// Opaque correlation id, echoed back unmodified.
    #[serde(default)]
    pub tid: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A JSON transport body: one call or a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    Batch(Vec<CallEnvelope>),
    Single(CallEnvelope),
}

/// Field values of a form-submission call, with the reserved routing fields
/// removed. Repeated fields are collected into an array of strings.
pub type FormData = serde_json::Map<String, serde_json::Value>;

/// Arguments of a decoded call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    /// JSON call; `None` when the client sent `data: null` or omitted it.
    Positional(Option<Vec<serde_json::Value>>),
    /// Form-submission call.
    Form(FormData),
}

/// One decoded call, consumed once per dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub action: String,
    pub method: String,
    pub tid: serde_json::Value,
    pub args: CallArgs,
    /// Form-submission calls whose body carried `extUpload=true`.
    pub upload: bool,
}

impl RpcCall {
    pub fn is_form_submission(&self) -> bool {
        matches!(self.args, CallArgs::Form(_))
    }
}

impl From<CallEnvelope> for RpcCall {
    fn from(envelope: CallEnvelope) -> Self {
        let args = match envelope.data {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Array(items)) => Some(items),
            Some(other) => Some(vec![other]),
        };
        Self {
            action: envelope.action,
            method: envelope.method,
            tid: envelope.tid,
            args: CallArgs::Positional(args),
            upload: false,
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

/// Server → client response envelope. One per call, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub action: String,
    pub method: String,
    pub tid: serde_json::Value,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ResponseEnvelope {
    pub fn result(call: &RpcCall, result: serde_json::Value) -> Self {
        Self {
            action: call.action.clone(),
            method: call.method.clone(),
            tid: call.tid.clone(),
            r#type: envelope_types::RESULT.into(),
            result: Some(result),
            message: None,
            location: None,
        }
    }

    pub fn exception(
        call: &RpcCall,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            action: call.action.clone(),
            method: call.method.clone(),
            tid: call.tid.clone(),
            r#type: envelope_types::EXCEPTION.into(),
            result: None,
            message: Some(message.into()),
            location: Some(location.into()),
        }
    }

    pub fn is_exception(&self) -> bool {
        self.r#type == envelope_types::EXCEPTION
    }
}

/// Response body: a batch answers with an array, a single call with one
/// unwrapped envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Batch(Vec<ResponseEnvelope>),
    Single(ResponseEnvelope),
}

// ── Polling ──────────────────────────────────────────────────────────────────

/// Answer to a polling provider request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollEvent {
    pub r#type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl PollEvent {
    pub fn event(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            r#type: envelope_types::EVENT.into(),
            name: name.into(),
            data: Some(data),
            message: None,
            location: None,
        }
    }

    pub fn exception(
        name: impl Into<String>,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            r#type: envelope_types::EXCEPTION.into(),
            name: name.into(),
            data: None,
            message: Some(message.into()),
            location: Some(location.into()),
        }
    }
}

// ── Descriptor ───────────────────────────────────────────────────────────────

/// Describes a single remotable method for client bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Number of positional arguments the client should send.
    pub len: usize,
    #[serde(rename = "formHandler")]
    pub form_handler: bool,
}

/// Provider configuration handed to the client, listing every registered
/// action and its methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub url: String,
    pub namespace: String,
    pub r#type: String,
    pub actions: BTreeMap<String, Vec<MethodDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Fully qualified descriptor variable, only present in the JSON form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}
