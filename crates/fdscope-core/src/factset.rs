//! Sets of facts keyed by variable.
//!
//! A `FactSet` maps each variable to the set of its values that belong to the
//! set. It only grows: there is no removal, matching the monotone nature of
//! relevance analysis. Empty value sets are never stored, so two fact sets are
//! equal exactly when they contain the same facts.

use fdscope_task::{Fact, ValueId, VarId};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static NO_VALUES: BTreeSet<ValueId> = BTreeSet::new();

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactSet {
    facts: BTreeMap<VarId, BTreeSet<ValueId>>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The variable-domain table: every variable mapped to `0..range`.
    pub fn domains(ranges: &[usize]) -> Self {
        let mut set = FactSet::new();
        for (var, &range) in ranges.iter().enumerate() {
            set.union_values(var, &(0..range).collect());
        }
        set
    }

    /// Insert `var = val`. Returns whether the fact was new.
    pub fn add(&mut self, var: VarId, val: ValueId) -> bool {
        self.facts.entry(var).or_default().insert(val)
    }

    #[inline]
    pub fn insert(&mut self, fact: Fact) -> bool {
        self.add(fact.var, fact.val)
    }

    /// Insert every fact of `facts`.
    pub fn add_all<I>(&mut self, facts: I)
    where
        I: IntoIterator,
        I::Item: Into<Fact>,
    {
        for fact in facts {
            self.insert(fact.into());
        }
    }

    /// In-place union with another fact set.
    pub fn union(&mut self, other: &FactSet) {
        for (&var, values) in &other.facts {
            self.union_values(var, values);
        }
    }

    /// In-place union of one variable's values.
    pub fn union_values(&mut self, var: VarId, values: &BTreeSet<ValueId>) {
        if values.is_empty() {
            return;
        }
        match self.facts.entry(var) {
            btree_map::Entry::Occupied(mut e) => e.get_mut().extend(values.iter().copied()),
            btree_map::Entry::Vacant(e) => {
                e.insert(values.clone());
            }
        }
    }

    /// Whether `fact` is in the set. Unknown variables are simply absent.
    #[inline]
    pub fn contains(&self, fact: Fact) -> bool {
        self.facts
            .get(&fact.var)
            .is_some_and(|values| values.contains(&fact.val))
    }

    pub fn contains_var(&self, var: VarId) -> bool {
        self.facts.contains_key(&var)
    }

    /// Values of `var` in the set; empty when the variable is absent.
    pub fn values(&self, var: VarId) -> &BTreeSet<ValueId> {
        self.facts.get(&var).unwrap_or(&NO_VALUES)
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.facts.keys().copied()
    }

    pub fn variable_set(&self) -> BTreeSet<VarId> {
        self.facts.keys().copied().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, VarId, BTreeSet<ValueId>> {
        self.facts.iter()
    }

    /// Every fact in the set, ordered by variable then value.
    pub fn iter_facts(&self) -> impl Iterator<Item = Fact> + '_ {
        self.facts
            .iter()
            .flat_map(|(&var, values)| values.iter().map(move |&val| Fact::new(var, val)))
    }

    /// Number of variables with at least one value.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Total number of facts.
    pub fn num_facts(&self) -> usize {
        self.facts.values().map(BTreeSet::len).sum()
    }

    pub fn is_subset(&self, other: &FactSet) -> bool {
        self.facts
            .iter()
            .all(|(var, values)| values.is_subset(other.values(*var)))
    }
}

impl FromIterator<Fact> for FactSet {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        let mut set = FactSet::new();
        set.add_all(iter);
        set
    }
}

impl Extend<Fact> for FactSet {
    fn extend<I: IntoIterator<Item = Fact>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<'a> IntoIterator for &'a FactSet {
    type Item = (&'a VarId, &'a BTreeSet<ValueId>);
    type IntoIter = btree_map::Iter<'a, VarId, BTreeSet<ValueId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.iter()
    }
}

impl fmt::Display for FactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, values)) in self.facts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "v{}: {:?}", var, values)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(VarId, ValueId)]) -> FactSet {
        pairs.iter().map(|&p| Fact::from(p)).collect()
    }

    #[test]
    fn test_add_and_contains() {
        let mut facts = FactSet::new();
        assert!(facts.add(0, 1));
        assert!(!facts.add(0, 1));
        assert!(facts.contains(Fact::new(0, 1)));
        assert!(!facts.contains(Fact::new(0, 2)));
        assert!(!facts.contains(Fact::new(9, 0)));
        assert_eq!(facts.num_facts(), 1);
    }

    #[test]
    fn test_missing_variable_is_empty() {
        let facts = FactSet::new();
        assert!(facts.values(3).is_empty());
        assert!(!facts.contains_var(3));
    }

    #[test]
    fn test_union_never_stores_empty_sets() {
        let mut facts = FactSet::new();
        facts.union_values(2, &BTreeSet::new());
        assert!(facts.is_empty());
        assert_eq!(facts, FactSet::new());
    }

    #[test]
    fn test_union() {
        let mut a = set(&[(0, 0), (1, 1)]);
        let b = set(&[(0, 2), (2, 0)]);
        a.union(&b);
        assert_eq!(a, set(&[(0, 0), (0, 2), (1, 1), (2, 0)]));
        assert!(b.is_subset(&a));
        assert!(!a.is_subset(&b));
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = set(&[(1, 0), (0, 1), (0, 0)]);
        let b = set(&[(0, 0), (0, 1), (1, 0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_domains() {
        let domains = FactSet::domains(&[3, 2]);
        assert_eq!(domains.values(0), &BTreeSet::from([0, 1, 2]));
        assert_eq!(domains.values(1), &BTreeSet::from([0, 1]));
        assert_eq!(domains.num_facts(), 5);
        assert_eq!(domains.variable_set(), BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_iter_facts_ordered() {
        let facts = set(&[(1, 0), (0, 2), (0, 1)]);
        let listed: Vec<Fact> = facts.iter_facts().collect();
        assert_eq!(
            listed,
            vec![Fact::new(0, 1), Fact::new(0, 2), Fact::new(1, 0)]
        );
    }

    #[test]
    fn test_display() {
        let facts = set(&[(0, 1), (2, 0)]);
        assert_eq!(facts.to_string(), "{v0: {1}, v2: {0}}");
    }

    #[test]
    fn test_serde_roundtrip() {
        let facts = set(&[(0, 1), (3, 2)]);
        let json = serde_json::to_string(&facts).unwrap();
        let back: FactSet = serde_json::from_str(&json).unwrap();
        assert_eq!(facts, back);
    }
}
