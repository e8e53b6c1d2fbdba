//! Action registry: `(action, method)` → handler and its dispatch policy.
//!
//! Built mutably by the composition root at start-up, then shared read-only
//! behind an `Arc` for the lifetime of the server.

use std::{collections::BTreeMap, sync::Arc};

use {
    remoting_protocol::{MethodDescriptor, ProviderDescriptor, REMOTING_PROVIDER_TYPE},
    tracing::debug,
};

use crate::handler::ActionHandler;

#[derive(Clone)]
pub struct RegisteredAction {
    pub action: String,
    pub method: String,
    pub handler: Arc<dyn ActionHandler>,
    /// Number of positional arguments announced to the client.
    pub arity: usize,
    pub form_handler: bool,
    pub requires_auth: bool,
    pub permission: Option<String>,
}

impl RegisteredAction {
    pub fn new(
        action: impl Into<String>,
        method: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            action: action.into(),
            method: method.into(),
            handler,
            arity: 0,
            form_handler: false,
            requires_auth: false,
            permission: None,
        }
    }

    pub fn arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn form_handler(mut self, form_handler: bool) -> Self {
        self.form_handler = form_handler;
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn permission(mut self, permission: Option<String>) -> Self {
        self.permission = permission;
        self
    }

    /// `action.method`, as used in logs and exception locations.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.action, self.method)
    }
}

impl std::fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("action", &self.action)
            .field("method", &self.method)
            .field("arity", &self.arity)
            .field("form_handler", &self.form_handler)
            .field("requires_auth", &self.requires_auth)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, BTreeMap<String, RegisteredAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method. Re-registering a key replaces the previous entry.
    pub fn register(&mut self, entry: RegisteredAction) {
        debug!(action = %entry.action, method = %entry.method, "registered remoting method");
        self.actions
            .entry(entry.action.clone())
            .or_default()
            .insert(entry.method.clone(), entry);
    }

    pub fn resolve(&self, action: &str, method: &str) -> Option<&RegisteredAction> {
        self.actions.get(action)?.get(method)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.actions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Provider descriptor listing every action and method in sorted order.
    pub fn descriptor(&self, url: &str, namespace: &str, id: Option<&str>) -> ProviderDescriptor {
        let actions = self
            .actions
            .iter()
            .map(|(action, methods)| {
                let methods = methods
                    .values()
                    .map(|m| MethodDescriptor {
                        name: m.method.clone(),
                        len: m.arity,
                        form_handler: m.form_handler,
                    })
                    .collect();
                (action.clone(), methods)
            })
            .collect();
        ProviderDescriptor {
            url: url.to_string(),
            namespace: namespace.to_string(),
            r#type: REMOTING_PROVIDER_TYPE.to_string(),
            actions,
            id: id.map(str::to_string),
            descriptor: None,
        }
    }
}
