//! Summaries of a scoping run and the reduced task it implies.

use crate::relevance::{Relevance, ScopeConfig, Scoper};
use crate::ScopeResult;
use fdscope_task::{FdTask, VarId};
use std::fmt;
use tracing::info;

/// How much of a task survived relevance analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeReport {
    pub num_vars: usize,
    pub relevant_vars: usize,
    pub num_facts: usize,
    pub relevant_facts: usize,
    pub num_actions: usize,
    pub relevant_actions: usize,
    pub iterations: usize,
    /// Variables with no relevant fact.
    pub irrelevant_vars: Vec<VarId>,
    /// Names of actions outside the relevant set, sorted.
    pub pruned_actions: Vec<String>,
}

impl ScopeReport {
    pub fn new(scoper: &Scoper, relevance: &Relevance) -> Self {
        let domains = scoper.domains();
        let irrelevant_vars: Vec<VarId> = domains
            .variables()
            .filter(|&var| !relevance.facts.contains_var(var))
            .collect();
        let mut pruned_actions: Vec<String> = scoper
            .actions()
            .iter()
            .enumerate()
            .filter(|(id, _)| !relevance.action_ids.contains(id))
            .map(|(_, a)| a.name().to_string())
            .collect();
        pruned_actions.sort_unstable();

        ScopeReport {
            num_vars: domains.len(),
            relevant_vars: relevance.facts.len(),
            num_facts: domains.num_facts(),
            relevant_facts: relevance.facts.num_facts(),
            num_actions: scoper.actions().len(),
            relevant_actions: relevance.action_ids.len(),
            iterations: relevance.iterations,
            irrelevant_vars,
            pruned_actions,
        }
    }

    /// Fraction of actions pruned (0.0-1.0).
    pub fn action_reduction(&self) -> f64 {
        if self.num_actions == 0 {
            0.0
        } else {
            (self.num_actions - self.relevant_actions) as f64 / self.num_actions as f64
        }
    }
}

impl fmt::Display for ScopeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "variables: {}/{} relevant",
            self.relevant_vars, self.num_vars
        )?;
        writeln!(
            f,
            "facts:     {}/{} relevant",
            self.relevant_facts, self.num_facts
        )?;
        writeln!(
            f,
            "actions:   {}/{} relevant ({:.0}% pruned)",
            self.relevant_actions,
            self.num_actions,
            self.action_reduction() * 100.0
        )?;
        write!(f, "converged after {} iterations", self.iterations)
    }
}

/// Scope `task` and return a copy that keeps only the relevant operators,
/// along with the analysis result. Variables keep their indices.
pub fn scope_task(task: &FdTask, config: &ScopeConfig) -> ScopeResult<(FdTask, Relevance)> {
    let scoper = Scoper::from_task(task, config.clone())?;
    let relevance = scoper.run()?;
    let operators = relevance.actions.iter().map(|a| a.to_operator()).collect();
    let scoped = task.with_operators(operators);
    info!(
        operators = task.operators.len(),
        kept = scoped.operators.len(),
        "scoped task"
    );
    Ok((scoped, relevance))
}
