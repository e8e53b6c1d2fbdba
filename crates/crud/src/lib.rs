//! CRUD orchestration for record types exposed over the remoting gateway.
//!
//! [`register_crud`] registers `create`, `read`, `load`, `update` and
//! `destroy` for one record type. Writes run item by item inside a savepoint
//! and stop at the first failing item, rolling back the whole batch.

pub mod crud;
pub mod hooks;
pub mod normalize;
pub mod options;
pub mod savepoint;

pub use {
    crud::{Crud, register_crud},
    hooks::{CrudHooks, NoHooks, Veto},
    options::{CrudAction, CrudMessages, CrudOptions},
    savepoint::SavepointScope,
};
