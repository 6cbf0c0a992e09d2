//! Causal-link filtering of initial-state facts.
//!
//! An initial-state fact is unthreatened when no relevant action writes its
//! variable to a different value. Such a fact holds for the whole plan, so
//! it needs no supporting actions and can be left out of the facts that drive
//! the next relevance step.

use crate::action::VarValAction;
use crate::factset::FactSet;
use fdscope_task::Fact;
use tracing::trace;

/// Initial-state facts that none of `actions` can overwrite.
pub fn unthreatened_init_facts<'a, I>(init: &[Fact], actions: I) -> FactSet
where
    I: IntoIterator<Item = &'a VarValAction>,
{
    let mut written = FactSet::new();
    for action in actions {
        written.add_all(action.effects().iter().copied());
    }
    init.iter()
        .copied()
        .filter(|fact| {
            let values = written.values(fact.var);
            values.is_empty() || (values.len() == 1 && values.contains(&fact.val))
        })
        .collect()
}

/// `facts` without the initial-state facts `actions` leave unthreatened.
/// Facts outside the initial state, or on threatened variables, pass through.
pub fn filter_causally_linked<'a, I>(facts: &FactSet, init: &[Fact], actions: I) -> FactSet
where
    I: IntoIterator<Item = &'a VarValAction>,
{
    let unthreatened = unthreatened_init_facts(init, actions);
    facts
        .iter_facts()
        .filter(|&fact| {
            let keep = !unthreatened.contains(fact);
            if !keep {
                trace!(%fact, "dropping unthreatened initial fact");
            }
            keep
        })
        .collect()
}
