//! Filter-expression language for record queries.
//!
//! A JSON filter expression (`{"$or": [{"name": {"$icontains": "ab"}}, ...]}`)
//! is compiled into a backend-agnostic [`Predicate`] tree. Record stores
//! either translate the tree into their own query language or evaluate it
//! directly with [`Predicate::matches`].

pub mod error;
pub mod eval;
pub mod parser;
pub mod predicate;

pub use {
    error::{Error, Result},
    eval::compare_for_sort,
    parser::{compile, compile_str, lookup},
    predicate::{Op, Predicate},
};
