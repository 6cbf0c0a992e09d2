//! Structural checks on a `FdTask`.
//!
//! The relevance engine assumes well-formed input and never checks bounds on
//! its own. Callers that load tasks from untrusted sources run `validate`
//! first.

use crate::types::{FdTask, Fact, PreValue, ValueId, VarId};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("initial state has {found} values but the task declares {expected} variables")]
    InitLength { expected: usize, found: usize },

    #[error("variable '{name}' has an empty domain")]
    EmptyDomain { name: String },

    #[error("{context}: variable index {var} out of bounds (have {num_vars} variables)")]
    VarOutOfBounds {
        context: String,
        var: VarId,
        num_vars: usize,
    },

    #[error("{context}: value {val} out of range for variable {var} (range {range})")]
    ValueOutOfRange {
        context: String,
        var: VarId,
        val: ValueId,
        range: usize,
    },

    #[error("goal constrains variable {var} more than once")]
    DuplicateGoal { var: VarId },

    #[error("operator '{operator}': variable {var} is written more than once")]
    DuplicateEffect { operator: String, var: VarId },
}

pub type TaskResult<T> = Result<T, TaskError>;

/// Validate variable indices, value ranges, and per-variable uniqueness.
pub fn validate(task: &FdTask) -> TaskResult<()> {
    let ranges = task.ranges();
    let num_vars = ranges.len();

    for v in &task.variables {
        if v.range == 0 {
            return Err(TaskError::EmptyDomain {
                name: v.name.clone(),
            });
        }
    }

    if task.init.len() != num_vars {
        return Err(TaskError::InitLength {
            expected: num_vars,
            found: task.init.len(),
        });
    }
    for fact in task.init_facts() {
        check_fact(&ranges, fact, "init")?;
    }

    let mut goal_vars = HashSet::new();
    for &fact in &task.goal {
        check_fact(&ranges, fact, "goal")?;
        if !goal_vars.insert(fact.var) {
            return Err(TaskError::DuplicateGoal { var: fact.var });
        }
    }

    for op in &task.operators {
        let context = format!("operator '{}'", op.name);
        for &fact in &op.prevail {
            check_fact(&ranges, fact, &context)?;
        }
        let mut written = HashSet::new();
        for pp in &op.pre_post {
            check_fact(&ranges, Fact::new(pp.var, pp.post), &context)?;
            if let PreValue::Value(pre) = pp.pre {
                check_fact(&ranges, Fact::new(pp.var, pre), &context)?;
            }
            for &cond in &pp.conditions {
                check_fact(&ranges, cond, &context)?;
            }
            // Conditional effects may legitimately write one variable under
            // several triggers; only unconditional duplicates are malformed.
            if !pp.is_conditional() && !written.insert(pp.var) {
                return Err(TaskError::DuplicateEffect {
                    operator: op.name.clone(),
                    var: pp.var,
                });
            }
        }
    }

    Ok(())
}

fn check_fact(ranges: &[usize], fact: Fact, context: &str) -> TaskResult<()> {
    let Some(&range) = ranges.get(fact.var) else {
        return Err(TaskError::VarOutOfBounds {
            context: context.to_string(),
            var: fact.var,
            num_vars: ranges.len(),
        });
    };
    if fact.val >= range {
        return Err(TaskError::ValueOutOfRange {
            context: context.to_string(),
            var: fact.var,
            val: fact.val,
            range,
        });
    }
    Ok(())
}
