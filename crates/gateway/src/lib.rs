//! Batched RPC gateway.
//!
//! An [`registry::ActionRegistry`] maps `(action, method)` pairs to handlers.
//! The [`dispatcher::Dispatcher`] decodes a transport body into one call or a
//! batch, authorizes and invokes each call in order, and maps every handler
//! [`handler::Outcome`] to exactly one response envelope. [`server`] exposes
//! the router, the client descriptor and polling providers over HTTP.

pub mod auth;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod polling;
pub mod registry;
pub mod server;

pub use {
    error::{Error, Result},
    handler::{ActionHandler, CallRequest, Outcome, handler_fn},
    registry::{ActionRegistry, RegisteredAction},
};
