//! Finite-domain planning task model for fdscope.
//!
//! This crate defines the grounded variable/value task representation the
//! relevance engine consumes: variables with bounded domains, an initial
//! state, a goal, and operators split into prevail and pre/post conditions.
//! Translators produce `FdTask` values (or their JSON form); the engine in
//! `fdscope-core` never parses or writes task files itself.

mod types;
mod validate;

pub use types::*;
pub use validate::{validate, TaskError, TaskResult};
