//! Grounded actions in variable/value form.
//!
//! A `VarValAction` is the engine's normalized view of an operator: a flat
//! precondition, a flat effect list, and a cost. It is built once from the
//! task's prevail + pre/post representation and never mutated afterwards.

use crate::factset::FactSet;
use crate::{ScopeError, ScopeResult};
use fdscope_task::{FdOperator, Fact, PrePost, PreValue, ValueId, VarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A precondition entry: a variable and the value it must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub var: VarId,
    pub value: PreValue,
}

impl Condition {
    pub const fn exactly(var: VarId, val: ValueId) -> Self {
        Condition {
            var,
            value: PreValue::Value(val),
        }
    }

    /// An entry that mentions `var` without constraining it.
    pub const fn any(var: VarId) -> Self {
        Condition {
            var,
            value: PreValue::Any,
        }
    }

    /// The required fact, or `None` for an unconstrained entry.
    pub fn fact(self) -> Option<Fact> {
        self.value.value().map(|val| Fact::new(self.var, val))
    }
}

impl From<Fact> for Condition {
    fn from(fact: Fact) -> Self {
        Condition::exactly(fact.var, fact.val)
    }
}

impl From<(VarId, ValueId)> for Condition {
    fn from((var, val): (VarId, ValueId)) -> Self {
        Condition::exactly(var, val)
    }
}

/// Effects plus cost: the key under which actions may be merged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectSignature {
    /// Effects sorted by variable.
    pub effects: Vec<Fact>,
    pub cost: u32,
}

/// A grounded action with flat precondition and effect lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarValAction {
    name: String,
    precondition: Vec<Condition>,
    effects: Vec<Fact>,
    cost: u32,
}

impl VarValAction {
    pub fn new<P, E>(name: impl Into<String>, precondition: P, effects: E, cost: u32) -> Self
    where
        P: IntoIterator,
        P::Item: Into<Condition>,
        E: IntoIterator,
        E::Item: Into<Fact>,
    {
        VarValAction {
            name: name.into(),
            precondition: precondition.into_iter().map(Into::into).collect(),
            effects: effects.into_iter().map(Into::into).collect(),
            cost,
        }
    }

    /// Flatten an operator. Wildcard `pre` values contribute no precondition;
    /// the precondition is sorted and de-duplicated.
    ///
    /// Conditional effects are rejected with `ScopeError::UnsupportedFeature`.
    pub fn from_operator(op: &FdOperator) -> ScopeResult<Self> {
        if op.pre_post.iter().any(PrePost::is_conditional) {
            return Err(ScopeError::UnsupportedFeature {
                operator: op.name.clone(),
                feature: "conditional effects",
            });
        }

        let mut pre: BTreeSet<Fact> = op.prevail.iter().copied().collect();
        for pp in &op.pre_post {
            if let PreValue::Value(val) = pp.pre {
                pre.insert(Fact::new(pp.var, val));
            }
        }
        let effects = op
            .pre_post
            .iter()
            .map(|pp| Fact::new(pp.var, pp.post))
            .collect();

        Ok(VarValAction {
            name: op.name.clone(),
            precondition: pre.into_iter().map(Condition::from).collect(),
            effects,
            cost: op.cost,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precondition(&self) -> &[Condition] {
        &self.precondition
    }

    pub fn effects(&self) -> &[Fact] {
        &self.effects
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Variables the precondition mentions, constrained or not.
    pub fn precondition_vars(&self) -> BTreeSet<VarId> {
        self.precondition.iter().map(|c| c.var).collect()
    }

    /// Whether any effect writes `var`, to any value.
    pub fn writes(&self, var: VarId) -> bool {
        self.effects.iter().any(|e| e.var == var)
    }

    /// Whether at least one effect fact is in `facts`.
    pub fn achieves_any(&self, facts: &FactSet) -> bool {
        self.effects.iter().any(|&e| facts.contains(e))
    }

    /// Precondition facts that hold unchanged across the transition: the
    /// variable is either not written, or written to the same value.
    pub fn prevail(&self) -> Vec<Fact> {
        let written: FactSet = self.effects.iter().copied().collect();
        self.precondition
            .iter()
            .filter_map(|c| c.fact())
            .filter(|fact| {
                let values = written.values(fact.var);
                values.is_empty() || (values.len() == 1 && values.contains(&fact.val))
            })
            .collect()
    }

    /// Back to operator form: prevail facts plus one pre/post entry per
    /// effect that actually changes something.
    pub fn to_operator(&self) -> FdOperator {
        let prevail = self.prevail();
        let pre_post = self
            .effects
            .iter()
            .filter(|e| !prevail.contains(e))
            .map(|e| {
                let pre = self
                    .precondition
                    .iter()
                    .filter_map(|c| c.fact())
                    .find(|f| f.var == e.var && !prevail.contains(f))
                    .map(|f| f.val);
                PrePost::new(e.var, PreValue::from(pre), e.val)
            })
            .collect();
        FdOperator::new(self.name.clone(), prevail, pre_post, self.cost)
    }

    /// Effects and cost, optionally ignoring effects on variables outside
    /// `relevant`.
    pub fn effect_signature(&self, relevant: Option<&BTreeSet<VarId>>) -> EffectSignature {
        let mut effects: Vec<Fact> = self
            .effects
            .iter()
            .copied()
            .filter(|e| relevant.map_or(true, |vars| vars.contains(&e.var)))
            .collect();
        effects.sort_unstable();
        EffectSignature {
            effects,
            cost: self.cost,
        }
    }
}

impl fmt::Display for VarValAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.name)?;
        for (i, c) in self.precondition.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "v{}={}", c.var, c.value)?;
        }
        write!(f, "] -> [")?;
        for (i, e) in self.effects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "] ({})", self.cost)
    }
}
