//! Merging of actions that share an effect signature.
//!
//! A family of actions with identical effects and cost is applicable exactly
//! when at least one member's precondition holds. Merging enumerates the
//! partial states over the family's precondition variables that satisfy some
//! member, then projects out every variable whose value never matters. What
//! survives is the precondition the family as a whole depends on.
//!
//! Enumeration is exponential in the number of don't-care variables of a
//! single member. Callers partition by effect signature before merging.

use crate::action::VarValAction;
use crate::factset::FactSet;
use crate::{ScopeError, ScopeResult};
use fdscope_task::{Fact, ValueId, VarId};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use tracing::debug;

/// A partial assignment, sorted by variable.
pub type PartialState = SmallVec<[Fact; 8]>;

/// What a merge reports as the family's relevant precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOutput {
    /// Every fact occurring in a surviving partial state.
    #[default]
    Facts,
    /// Full domains of the variables that survived elimination.
    Variables,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Satisfying partial states after tautology elimination.
    pub states: BTreeSet<PartialState>,
    /// Precondition variables eliminated as non-discriminating.
    pub removed: BTreeSet<VarId>,
    /// Precondition variables that survived elimination.
    pub relevant_vars: BTreeSet<VarId>,
    /// The family's relevant precondition facts.
    pub facts: FactSet,
}

impl MergeResult {
    fn empty() -> Self {
        MergeResult {
            states: BTreeSet::new(),
            removed: BTreeSet::new(),
            relevant_vars: BTreeSet::new(),
            facts: FactSet::new(),
        }
    }

    /// Re-expand the eliminated variables over their full domains. The
    /// result equals `satisfying_states` of the merged family.
    pub fn expand(&self, domains: &FactSet) -> BTreeSet<PartialState> {
        let mut expanded = BTreeSet::new();
        for state in &self.states {
            let mut partial: Vec<PartialState> = vec![state.clone()];
            for &var in &self.removed {
                partial = extend_all(&partial, var, domains.values(var).iter().copied());
            }
            for mut s in partial {
                s.sort_unstable();
                expanded.insert(s);
            }
        }
        expanded
    }
}

/// Merge a family of actions into one relevant precondition.
///
/// Every member must have the same effect signature once restricted to
/// `restrict`; anything else is a partitioning bug and returns
/// `ScopeError::InvariantViolation`. `domains` is the variable-domain table.
pub fn merge(
    family: &[&VarValAction],
    restrict: Option<&BTreeSet<VarId>>,
    domains: &FactSet,
    output: MergeOutput,
) -> ScopeResult<MergeResult> {
    let Some((first, rest)) = family.split_first() else {
        return Ok(MergeResult::empty());
    };
    let signature = first.effect_signature(restrict);
    if let Some(other) = rest
        .iter()
        .find(|a| a.effect_signature(restrict) != signature)
    {
        return Err(ScopeError::InvariantViolation {
            first: first.name().to_string(),
            other: other.name().to_string(),
        });
    }

    if rest.is_empty() {
        return Ok(merge_single(first, domains, output));
    }

    let vars: BTreeSet<VarId> = family
        .iter()
        .flat_map(|a| a.precondition().iter().map(|c| c.var))
        .collect();
    let mut states = satisfying_states(family, domains);
    let before = states.len();
    let removed = eliminate_tautologies(&mut states, &vars, domains);
    let relevant_vars: BTreeSet<VarId> = vars.difference(&removed).copied().collect();

    debug!(
        family = family.len(),
        vars = vars.len(),
        states_before = before,
        states_after = states.len(),
        removed = removed.len(),
        "merged action family"
    );

    let facts = match output {
        MergeOutput::Facts => states.iter().flatten().copied().collect(),
        MergeOutput::Variables => full_domains(&relevant_vars, domains),
    };
    Ok(MergeResult {
        states,
        removed,
        relevant_vars,
        facts,
    })
}

/// One action: its precondition is the answer, wildcards widened to the
/// whole domain.
fn merge_single(action: &VarValAction, domains: &FactSet, output: MergeOutput) -> MergeResult {
    let relevant_vars = action.precondition_vars();
    let facts = match output {
        MergeOutput::Facts => {
            let mut facts = FactSet::new();
            for c in action.precondition() {
                match c.fact() {
                    Some(fact) => {
                        facts.insert(fact);
                    }
                    None => facts.union_values(c.var, domains.values(c.var)),
                }
            }
            facts
        }
        MergeOutput::Variables => full_domains(&relevant_vars, domains),
    };
    MergeResult {
        states: completions(action, &relevant_vars, domains).into_iter().collect(),
        removed: BTreeSet::new(),
        relevant_vars,
        facts,
    }
}

/// All partial states over the family's precondition variables that satisfy
/// at least one member. Variables a member does not constrain range over
/// their full domain.
pub fn satisfying_states(family: &[&VarValAction], domains: &FactSet) -> BTreeSet<PartialState> {
    let vars: BTreeSet<VarId> = family
        .iter()
        .flat_map(|a| a.precondition().iter().map(|c| c.var))
        .collect();
    family
        .iter()
        .flat_map(|a| completions(a, &vars, domains))
        .collect()
}

/// Project out variables that every combination of the others admits with
/// all of their values. Repeats until no candidate can be removed, and
/// returns the removed variables.
pub fn eliminate_tautologies(
    states: &mut BTreeSet<PartialState>,
    candidates: &BTreeSet<VarId>,
    domains: &FactSet,
) -> BTreeSet<VarId> {
    let mut removed = BTreeSet::new();
    if states.is_empty() {
        return removed;
    }
    loop {
        let mut changed = false;
        for &var in candidates {
            if removed.contains(&var) {
                continue;
            }
            let projected: BTreeSet<PartialState> = states
                .iter()
                .map(|s| s.iter().copied().filter(|f| f.var != var).collect())
                .collect();
            if projected.len() * domains.values(var).len() == states.len() {
                *states = projected;
                removed.insert(var);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    removed
}

/// Every completion of `action`'s precondition over `vars`. Iterating `vars`
/// in order keeps each state sorted.
fn completions(action: &VarValAction, vars: &BTreeSet<VarId>, domains: &FactSet) -> Vec<PartialState> {
    let mut states = vec![PartialState::new()];
    for &var in vars {
        match required_value(action, var) {
            Some(val) => {
                for s in &mut states {
                    s.push(Fact::new(var, val));
                }
            }
            None => states = extend_all(&states, var, domains.values(var).iter().copied()),
        }
    }
    states
}

fn required_value(action: &VarValAction, var: VarId) -> Option<ValueId> {
    action
        .precondition()
        .iter()
        .filter(|c| c.var == var)
        .find_map(|c| c.value.value())
}

fn extend_all(
    states: &[PartialState],
    var: VarId,
    values: impl Iterator<Item = ValueId> + Clone,
) -> Vec<PartialState> {
    let mut next = Vec::new();
    for s in states {
        for val in values.clone() {
            let mut t = s.clone();
            t.push(Fact::new(var, val));
            next.push(t);
        }
    }
    next
}

fn full_domains(vars: &BTreeSet<VarId>, domains: &FactSet) -> FactSet {
    let mut facts = FactSet::new();
    for &var in vars {
        facts.union_values(var, domains.values(var));
    }
    facts
}
