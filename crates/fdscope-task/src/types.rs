//! Finite-domain task types. No engine dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a task variable.
pub type VarId = usize;

/// Index of a value within a variable's domain.
pub type ValueId = usize;

/// A single variable assignment `var = val`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub var: VarId,
    pub val: ValueId,
}

impl Fact {
    #[inline]
    pub const fn new(var: VarId, val: ValueId) -> Self {
        Fact { var, val }
    }
}

impl From<(VarId, ValueId)> for Fact {
    fn from((var, val): (VarId, ValueId)) -> Self {
        Fact { var, val }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}={}", self.var, self.val)
    }
}

/// Value a pre/post entry requires before the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PreValue {
    /// No requirement: the effect fires from any value.
    Any,
    /// The variable must hold exactly this value.
    Value(ValueId),
}

impl PreValue {
    /// The required value, if any.
    #[inline]
    pub fn value(self) -> Option<ValueId> {
        match self {
            PreValue::Any => None,
            PreValue::Value(v) => Some(v),
        }
    }

    #[inline]
    pub fn is_any(self) -> bool {
        matches!(self, PreValue::Any)
    }
}

impl From<Option<ValueId>> for PreValue {
    fn from(v: Option<ValueId>) -> Self {
        match v {
            Some(v) => PreValue::Value(v),
            None => PreValue::Any,
        }
    }
}

impl fmt::Display for PreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreValue::Any => write!(f, "*"),
            PreValue::Value(v) => write!(f, "{}", v),
        }
    }
}

/// A finite-domain task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FdTask {
    /// State variables with their domain sizes.
    pub variables: Vec<FdVariable>,
    /// Initial state: one value per variable, indexed by variable.
    pub init: Vec<ValueId>,
    /// Goal facts.
    pub goal: Vec<Fact>,
    /// Grounded operators.
    pub operators: Vec<FdOperator>,
    /// Whether operator costs are meaningful.
    #[serde(default)]
    pub metric: bool,
}

/// A state variable declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FdVariable {
    pub name: String,
    /// Domain cardinality; values are `0..range`.
    pub range: usize,
    /// Optional human-readable names for each value.
    #[serde(default)]
    pub value_names: Vec<String>,
}

impl FdVariable {
    pub fn new(name: impl Into<String>, range: usize) -> Self {
        FdVariable {
            name: name.into(),
            range,
            value_names: Vec::new(),
        }
    }
}

/// One effect entry of an operator: `var` goes from `pre` to `post`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PrePost {
    pub var: VarId,
    pub pre: PreValue,
    pub post: ValueId,
    /// Trigger conditions of a conditional effect (empty for unconditional effects).
    #[serde(default)]
    pub conditions: Vec<Fact>,
}

impl PrePost {
    pub fn new(var: VarId, pre: PreValue, post: ValueId) -> Self {
        PrePost {
            var,
            pre,
            post,
            conditions: Vec::new(),
        }
    }

    /// Whether this effect only fires under extra trigger conditions.
    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }
}

/// A grounded operator in prevail + pre/post form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FdOperator {
    pub name: String,
    /// Conditions on variables the operator leaves untouched.
    #[serde(default)]
    pub prevail: Vec<Fact>,
    pub pre_post: Vec<PrePost>,
    #[serde(default)]
    pub cost: u32,
}

impl FdOperator {
    pub fn new(
        name: impl Into<String>,
        prevail: Vec<Fact>,
        pre_post: Vec<PrePost>,
        cost: u32,
    ) -> Self {
        FdOperator {
            name: name.into(),
            prevail,
            pre_post,
            cost,
        }
    }
}

impl FdTask {
    /// Domain size of every variable, in variable order.
    pub fn ranges(&self) -> Vec<usize> {
        self.variables.iter().map(|v| v.range).collect()
    }

    /// The initial state as a list of facts.
    pub fn init_facts(&self) -> Vec<Fact> {
        self.init
            .iter()
            .enumerate()
            .map(|(var, &val)| Fact::new(var, val))
            .collect()
    }

    /// Total number of (variable, value) facts in the task.
    pub fn num_facts(&self) -> usize {
        self.variables.iter().map(|v| v.range).sum()
    }

    /// Copy of this task with a different operator list.
    pub fn with_operators(&self, operators: Vec<FdOperator>) -> FdTask {
        FdTask {
            variables: self.variables.clone(),
            init: self.init.clone(),
            goal: self.goal.clone(),
            operators,
            metric: self.metric,
        }
    }

    /// Name of a value, falling back to its index.
    pub fn value_name(&self, fact: Fact) -> String {
        self.variables
            .get(fact.var)
            .and_then(|v| v.value_names.get(fact.val))
            .cloned()
            .unwrap_or_else(|| fact.to_string())
    }
}
