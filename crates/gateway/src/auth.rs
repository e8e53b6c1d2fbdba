//! Caller identity as seen by the dispatcher.

use std::{collections::BTreeSet, sync::Arc};

use {
    axum::http::HeaderMap,
    sha2::{Digest, Sha256},
};

/// Wildcard permission granting every named permission.
pub const ANY_PERMISSION: &str = "*";

pub trait AuthContext: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn has_permission(&self, name: &str) -> bool;
}

/// Unauthenticated caller without permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl AuthContext for Anonymous {
    fn is_authenticated(&self) -> bool {
        false
    }

    fn has_permission(&self, _name: &str) -> bool {
        false
    }
}

/// Authenticated caller holding a fixed permission set.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthContext for Principal {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(ANY_PERMISSION) || self.permissions.contains(name)
    }
}

/// Resolves the caller of one transport request.
pub trait AuthResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Arc<dyn AuthContext>;
}

/// Bearer-token resolver. Tokens are kept and compared as SHA-256 digests.
#[derive(Default)]
pub struct TokenAuth {
    tokens: Vec<(Vec<u8>, Arc<Principal>)>,
}

impl TokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        token: &str,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let digest = Sha256::digest(token.as_bytes()).to_vec();
        self.tokens.push((digest, Arc::new(Principal::new(permissions))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AuthResolver for TokenAuth {
    fn resolve(&self, headers: &HeaderMap) -> Arc<dyn AuthContext> {
        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(token) = provided else {
            return Arc::new(Anonymous);
        };
        let digest = Sha256::digest(token.as_bytes());
        match self
            .tokens
            .iter()
            .find(|(expected, _)| expected.as_slice() == digest.as_slice())
        {
            Some((_, principal)) => Arc::clone(principal) as Arc<dyn AuthContext>,
            None => Arc::new(Anonymous),
        }
    }
}
