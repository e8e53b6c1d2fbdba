//! Handler capability and its explicit outcome type.

use std::{future::Future, sync::Arc};

use {
    async_trait::async_trait,
    remoting_protocol::{CallArgs, FormData, RpcCall},
    remoting_store::FieldErrors,
    serde_json::{Map, Value},
};

use crate::auth::AuthContext;

/// Result of one handler invocation. The dispatcher maps each variant to an
/// envelope shape.
#[derive(Debug)]
pub enum Outcome {
    /// `rpc-result` carrying the value.
    Ok(Value),
    /// `rpc-result` carrying `{success: false, message}`.
    AuthFailure(String),
    /// `rpc-result` carrying `{success: false, errors}`.
    ValidationFailure(FieldErrors),
    /// `exception` envelope.
    Fatal(anyhow::Error),
}

impl From<anyhow::Result<Value>> for Outcome {
    fn from(result: anyhow::Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Fatal(e),
        }
    }
}

/// One invocation: the decoded call and the caller's identity.
pub struct CallRequest {
    pub call: RpcCall,
    pub auth: Arc<dyn AuthContext>,
}

impl CallRequest {
    pub fn new(call: RpcCall, auth: Arc<dyn AuthContext>) -> Self {
        Self { call, auth }
    }

    /// Positional arguments; empty for form submissions and `data: null`.
    pub fn args(&self) -> &[Value] {
        match &self.call.args {
            CallArgs::Positional(Some(args)) => args,
            _ => &[],
        }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args().get(index)
    }

    pub fn form(&self) -> Option<&FormData> {
        match &self.call.args {
            CallArgs::Form(data) => Some(data),
            CallArgs::Positional(_) => None,
        }
    }

    /// The parameter object of the call: the form fields of a submission,
    /// otherwise the first positional argument when it is an object.
    pub fn params(&self) -> Map<String, Value> {
        match &self.call.args {
            CallArgs::Form(data) => data.clone(),
            CallArgs::Positional(_) => self
                .arg(0)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, request: CallRequest) -> Outcome;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(CallRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    async fn call(&self, request: CallRequest) -> Outcome {
        (self.0)(request).await
    }
}

/// Adapt an async closure into an [`ActionHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(CallRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
