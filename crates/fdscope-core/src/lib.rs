//! Goal-relevance scoping for finite-domain planning tasks.
//!
//! Computes the facts and actions that can influence reaching a task's goal,
//! so a downstream planner can drop everything else before search. The core
//! is a backward fixed point over relevant facts and relevant actions, with
//! optional action merging and causal-link filtering.

pub mod action;
pub mod causal;
pub mod factset;
pub mod merge;
pub mod relevance;
pub mod report;

pub use action::{Condition, EffectSignature, VarValAction};
pub use causal::{filter_causally_linked, unthreatened_init_facts};
pub use factset::FactSet;
pub use fdscope_task::{Fact, PreValue, ValueId, VarId};
pub use merge::{
    eliminate_tautologies, merge, satisfying_states, MergeOutput, MergeResult, PartialState,
};
pub use relevance::{Granularity, IterationStats, Relevance, ScopeConfig, Scoper, Snapshot};
pub use report::{scope_task, ScopeReport};

use thiserror::Error;

/// Scoping error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("operator '{operator}': {feature} not supported")]
    UnsupportedFeature {
        operator: String,
        feature: &'static str,
    },

    #[error("cannot merge actions with different effect signatures: '{first}' and '{other}'")]
    InvariantViolation { first: String, other: String },

    #[error("snapshot refers to action {id}, but only {num_actions} actions exist")]
    UnknownAction { id: usize, num_actions: usize },

    #[error("relevance analysis did not converge within {limit} iterations")]
    NonConvergent { limit: usize },
}

pub type ScopeResult<T> = Result<T, ScopeError>;
