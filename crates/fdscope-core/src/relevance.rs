//! Goal-relevance fixed point.
//!
//! Starting from the goal, each step collects the actions that achieve a
//! relevant fact and adds their (optionally merged) preconditions to the
//! relevant facts. The loop stops once a step changes neither the fact set
//! nor the number of relevant actions. Both sets only grow, so this always
//! happens within `num_facts + num_actions` steps; a cap turns any violation
//! of that into `ScopeError::NonConvergent`.

use crate::action::{EffectSignature, VarValAction};
use crate::causal::filter_causally_linked;
use crate::factset::FactSet;
use crate::merge::{merge, MergeOutput};
use crate::{ScopeError, ScopeResult};
use fdscope_task::{FdTask, Fact, PreValue};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// How finely relevance is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    /// Track individual facts.
    #[default]
    Values,
    /// Track variables: any touched variable is relevant with its full domain.
    Variables,
}

/// Configuration for relevance analysis.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    /// Merge actions with equal effect signatures before collecting preconditions.
    pub merging: bool,
    /// Ignore initial-state facts no relevant action can overwrite.
    pub causal_links: bool,
    pub granularity: Granularity,
    /// Run per-family merges on the rayon thread pool.
    pub parallel: bool,
    /// Iteration cap (0 = derive from task size).
    pub max_iterations: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            merging: false,
            causal_links: false,
            granularity: Granularity::Values,
            parallel: false,
            max_iterations: 0,
        }
    }
}

/// The two relevant sets at an iteration boundary. Snapshots are plain data
/// and can be persisted and passed back to `Scoper::resume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub iteration: usize,
    pub facts: FactSet,
    /// Indices into `Scoper::actions`.
    pub actions: BTreeSet<usize>,
}

/// Sizes of the relevant sets after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationStats {
    pub iteration: usize,
    pub num_vars: usize,
    pub num_facts: usize,
    pub num_actions: usize,
}

/// Converged result of relevance analysis.
#[derive(Debug, Clone)]
pub struct Relevance {
    /// Relevant facts: the goal plus the preconditions of every relevant
    /// action. With causal links, unthreatened initial facts here take no
    /// part in selecting actions.
    pub facts: FactSet,
    /// Indices of the relevant actions in `Scoper::actions`.
    pub action_ids: BTreeSet<usize>,
    /// The relevant actions, in index order.
    pub actions: Vec<VarValAction>,
    /// Steps taken, including the final confirming step.
    pub iterations: usize,
    pub history: Vec<IterationStats>,
}

impl Relevance {
    /// Names of the relevant actions, sorted.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.iter().map(VarValAction::name).collect();
        names.sort_unstable();
        names
    }

    pub fn contains_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a.name() == name)
    }
}

/// Relevance analysis over one task.
///
/// The domain table, action list, initial state and goal are fixed at
/// construction. Indices and values are assumed to lie within the declared
/// domains; run `fdscope_task::validate` on untrusted tasks first.
#[derive(Debug, Clone)]
pub struct Scoper {
    domains: FactSet,
    actions: Vec<VarValAction>,
    init: Vec<Fact>,
    goal: Vec<Fact>,
    config: ScopeConfig,
}

impl Scoper {
    /// Build from parts. Duplicate actions are dropped, keeping the first.
    pub fn new(
        domains: FactSet,
        actions: Vec<VarValAction>,
        init: Vec<Fact>,
        goal: Vec<Fact>,
        config: ScopeConfig,
    ) -> Self {
        let mut seen = HashSet::new();
        let actions = actions
            .into_iter()
            .filter(|a| seen.insert(a.clone()))
            .collect();
        Scoper {
            domains,
            actions,
            init,
            goal,
            config,
        }
    }

    /// Build from a task. Fails on operators with conditional effects.
    pub fn from_task(task: &FdTask, config: ScopeConfig) -> ScopeResult<Self> {
        let actions = task
            .operators
            .iter()
            .map(VarValAction::from_operator)
            .collect::<ScopeResult<Vec<_>>>()?;
        Ok(Scoper::new(
            FactSet::domains(&task.ranges()),
            actions,
            task.init_facts(),
            task.goal.clone(),
            config,
        ))
    }

    pub fn domains(&self) -> &FactSet {
        &self.domains
    }

    pub fn actions(&self) -> &[VarValAction] {
        &self.actions
    }

    pub fn init(&self) -> &[Fact] {
        &self.init
    }

    pub fn goal(&self) -> &[Fact] {
        &self.goal
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Goal facts and no actions.
    pub fn initial_snapshot(&self) -> Snapshot {
        let goal: FactSet = self.goal.iter().copied().collect();
        Snapshot {
            iteration: 0,
            facts: self.widen(goal),
            actions: BTreeSet::new(),
        }
    }

    /// Run to convergence from the goal.
    pub fn run(&self) -> ScopeResult<Relevance> {
        self.resume(self.initial_snapshot())
    }

    /// Run to convergence from a saved iteration boundary.
    ///
    /// Fails with `ScopeError::UnknownAction` if the snapshot names an
    /// action index this scoper does not have.
    pub fn resume(&self, snapshot: Snapshot) -> ScopeResult<Relevance> {
        self.check_snapshot(&snapshot)?;
        let limit = self.iteration_limit();
        info!(
            merging = self.config.merging,
            causal_links = self.config.causal_links,
            granularity = ?self.config.granularity,
            parallel = self.config.parallel,
            actions = self.actions.len(),
            start = snapshot.iteration,
            "starting goal relevance analysis"
        );

        let mut current = snapshot;
        let mut history = Vec::new();
        let mut steps = 0;
        loop {
            if steps >= limit {
                return Err(ScopeError::NonConvergent { limit });
            }
            let next = self.step(&current)?;
            steps += 1;
            let stats = IterationStats {
                iteration: next.iteration,
                num_vars: next.facts.len(),
                num_facts: next.facts.num_facts(),
                num_actions: next.actions.len(),
            };
            debug!(
                iteration = stats.iteration,
                facts = stats.num_facts,
                actions = stats.num_actions,
                "relevance step"
            );
            history.push(stats);

            let converged =
                next.facts == current.facts && next.actions.len() == current.actions.len();
            current = next;
            if converged {
                break;
            }
        }

        let facts = current.facts;
        let actions: Vec<VarValAction> = self.actions_of(&current.actions).cloned().collect();

        info!(
            iterations = steps,
            facts = facts.num_facts(),
            actions = actions.len(),
            "relevance analysis converged"
        );

        Ok(Relevance {
            facts,
            action_ids: current.actions,
            actions,
            iterations: steps,
            history,
        })
    }

    /// One relevance-propagation step.
    pub fn step(&self, prev: &Snapshot) -> ScopeResult<Snapshot> {
        self.check_snapshot(prev)?;
        let filtered = if self.config.causal_links {
            filter_causally_linked(&prev.facts, &self.init, self.actions_of(&prev.actions))
        } else {
            prev.facts.clone()
        };

        let actions = self.achieving_actions(&filtered);
        let preconditions = if self.config.merging {
            self.merged_preconditions(&filtered, &actions)?
        } else {
            self.plain_preconditions(&actions)
        };

        let mut facts = prev.facts.clone();
        facts.union(&preconditions);
        Ok(Snapshot {
            iteration: prev.iteration + 1,
            facts: self.widen(facts),
            actions,
        })
    }

    fn check_snapshot(&self, snapshot: &Snapshot) -> ScopeResult<()> {
        match snapshot.actions.last() {
            Some(&id) if id >= self.actions.len() => Err(ScopeError::UnknownAction {
                id,
                num_actions: self.actions.len(),
            }),
            _ => Ok(()),
        }
    }

    fn actions_of<'a>(
        &'a self,
        ids: &'a BTreeSet<usize>,
    ) -> impl Iterator<Item = &'a VarValAction> + 'a {
        ids.iter().map(move |&id| &self.actions[id])
    }

    fn iteration_limit(&self) -> usize {
        if self.config.max_iterations > 0 {
            self.config.max_iterations
        } else {
            self.domains.num_facts() + self.actions.len() + 2
        }
    }

    /// Actions with at least one effect in `facts`.
    fn achieving_actions(&self, facts: &FactSet) -> BTreeSet<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.achieves_any(facts))
            .map(|(id, _)| id)
            .collect()
    }

    /// Union of every precondition, wildcards widened to the whole domain.
    fn plain_preconditions(&self, actions: &BTreeSet<usize>) -> FactSet {
        let mut facts = FactSet::new();
        for action in self.actions_of(actions) {
            for c in action.precondition() {
                match (c.value, self.config.granularity) {
                    (PreValue::Value(val), Granularity::Values) => {
                        facts.add(c.var, val);
                    }
                    _ => facts.union_values(c.var, self.domains.values(c.var)),
                }
            }
        }
        facts
    }

    /// Partition by effect signature on the variables of `facts`, merge each
    /// family, and union the results.
    fn merged_preconditions(
        &self,
        facts: &FactSet,
        actions: &BTreeSet<usize>,
    ) -> ScopeResult<FactSet> {
        let restrict = facts.variable_set();
        let mut partitions: BTreeMap<EffectSignature, Vec<&VarValAction>> = BTreeMap::new();
        for action in self.actions_of(actions) {
            partitions
                .entry(action.effect_signature(Some(&restrict)))
                .or_default()
                .push(action);
        }
        let families: Vec<Vec<&VarValAction>> = partitions.into_values().collect();
        let output = match self.config.granularity {
            Granularity::Values => MergeOutput::Facts,
            Granularity::Variables => MergeOutput::Variables,
        };

        let merged = if self.config.parallel {
            families
                .par_iter()
                .map(|family| merge(family, Some(&restrict), &self.domains, output))
                .collect::<ScopeResult<Vec<_>>>()?
        } else {
            families
                .iter()
                .map(|family| merge(family, Some(&restrict), &self.domains, output))
                .collect::<ScopeResult<Vec<_>>>()?
        };

        let mut result = FactSet::new();
        for m in &merged {
            result.union(&m.facts);
        }
        Ok(result)
    }

    /// In `Variables` mode, widen every touched variable to its full domain.
    fn widen(&self, facts: FactSet) -> FactSet {
        match self.config.granularity {
            Granularity::Values => facts,
            Granularity::Variables => {
                let mut wide = FactSet::new();
                for var in facts.variables() {
                    wide.union_values(var, self.domains.values(var));
                }
                wide
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Condition;

    fn action(name: &str, pre: &[(usize, usize)], eff: &[(usize, usize)]) -> VarValAction {
        VarValAction::new(
            name,
            pre.iter().map(|&p| Condition::from(p)).collect::<Vec<_>>(),
            eff.iter().map(|&p| Fact::from(p)).collect::<Vec<_>>(),
            1,
        )
    }

    fn facts(pairs: &[(usize, usize)]) -> FactSet {
        pairs.iter().map(|&p| Fact::from(p)).collect()
    }

    /// A counter 0 -> 1 -> 2 -> 3 plus an unrelated toggle.
    fn counter(config: ScopeConfig) -> Scoper {
        Scoper::new(
            FactSet::domains(&[4, 2]),
            vec![
                action("inc0", &[(0, 0)], &[(0, 1)]),
                action("inc1", &[(0, 1)], &[(0, 2)]),
                action("inc2", &[(0, 2)], &[(0, 3)]),
                action("toggle", &[(1, 0)], &[(1, 1)]),
            ],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(0, 3)],
            config,
        )
    }

    #[test]
    fn test_counter_chain() {
        let relevance = counter(ScopeConfig::default()).run().unwrap();
        assert_eq!(relevance.facts, facts(&[(0, 0), (0, 1), (0, 2), (0, 3)]));
        assert_eq!(relevance.action_names(), vec!["inc0", "inc1", "inc2"]);
        assert!(!relevance.contains_action("toggle"));
        assert_eq!(relevance.iterations, relevance.history.len());
    }

    #[test]
    fn test_first_step() {
        let scoper = counter(ScopeConfig::default());
        let start = scoper.initial_snapshot();
        assert_eq!(start.facts, facts(&[(0, 3)]));
        let next = scoper.step(&start).unwrap();
        assert_eq!(next.iteration, 1);
        assert_eq!(next.actions, BTreeSet::from([2]));
        assert_eq!(next.facts, facts(&[(0, 2), (0, 3)]));
    }

    #[test]
    fn test_empty_goal_converges_immediately() {
        let mut scoper = counter(ScopeConfig::default());
        scoper.goal.clear();
        let relevance = scoper.run().unwrap();
        assert!(relevance.facts.is_empty());
        assert!(relevance.actions.is_empty());
        assert_eq!(relevance.iterations, 1);
    }

    #[test]
    fn test_iteration_cap() {
        let config = ScopeConfig {
            max_iterations: 2,
            ..ScopeConfig::default()
        };
        assert_eq!(
            counter(config).run().unwrap_err(),
            ScopeError::NonConvergent { limit: 2 }
        );
    }

    #[test]
    fn test_resume_matches_run() {
        let scoper = counter(ScopeConfig::default());
        let full = scoper.run().unwrap();
        let first = scoper.step(&scoper.initial_snapshot()).unwrap();
        let json = serde_json::to_string(&first).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, first);
        let resumed = scoper.resume(restored).unwrap();
        assert_eq!(resumed.facts, full.facts);
        assert_eq!(resumed.action_ids, full.action_ids);
    }

    #[test]
    fn test_duplicate_actions_collapse() {
        let scoper = Scoper::new(
            FactSet::domains(&[2]),
            vec![
                action("a", &[(0, 0)], &[(0, 1)]),
                action("a", &[(0, 0)], &[(0, 1)]),
            ],
            vec![Fact::new(0, 0)],
            vec![Fact::new(0, 1)],
            ScopeConfig::default(),
        );
        assert_eq!(scoper.actions().len(), 1);
        assert_eq!(scoper.run().unwrap().actions.len(), 1);
    }

    #[test]
    fn test_wildcard_precondition_widens() {
        let scoper = Scoper::new(
            FactSet::domains(&[3, 2]),
            vec![VarValAction::new(
                "reset",
                [Condition::any(0)],
                [Fact::new(1, 1)],
                1,
            )],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(1, 1)],
            ScopeConfig::default(),
        );
        let relevance = scoper.run().unwrap();
        assert_eq!(relevance.facts, facts(&[(0, 0), (0, 1), (0, 2), (1, 1)]));
    }

    #[test]
    fn test_variables_granularity_widens_goal() {
        let config = ScopeConfig {
            granularity: Granularity::Variables,
            ..ScopeConfig::default()
        };
        let scoper = counter(config);
        assert_eq!(scoper.initial_snapshot().facts, facts(&[(0, 0), (0, 1), (0, 2), (0, 3)]));
    }

    #[test]
    fn test_merging_collapses_cover() {
        // Two ways to reach w=1 that together cover both values of a.
        let scoper = Scoper::new(
            FactSet::domains(&[2, 2]),
            vec![action("via0", &[(0, 0)], &[(1, 1)]), action("via1", &[(0, 1)], &[(1, 1)])],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(1, 1)],
            ScopeConfig {
                merging: true,
                ..ScopeConfig::default()
            },
        );
        let relevance = scoper.run().unwrap();
        assert_eq!(relevance.facts, facts(&[(1, 1)]));
        assert_eq!(relevance.action_names(), vec!["via0", "via1"]);

        let plain = Scoper::new(
            scoper.domains().clone(),
            scoper.actions().to_vec(),
            scoper.init().to_vec(),
            scoper.goal().to_vec(),
            ScopeConfig::default(),
        );
        assert_eq!(plain.run().unwrap().facts, facts(&[(0, 0), (0, 1), (1, 1)]));
    }

    #[test]
    fn test_parallel_merge_agrees() {
        let sequential = counter(ScopeConfig {
            merging: true,
            ..ScopeConfig::default()
        })
        .run()
        .unwrap();
        let parallel = counter(ScopeConfig {
            merging: true,
            parallel: true,
            ..ScopeConfig::default()
        })
        .run()
        .unwrap();
        assert_eq!(sequential.facts, parallel.facts);
        assert_eq!(sequential.action_ids, parallel.action_ids);
    }

    #[test]
    fn test_causal_links_skip_unthreatened_init() {
        // The goal needs y=1 and x=0. Nothing writes x, so x=0 needs no support.
        let scoper = Scoper::new(
            FactSet::domains(&[2, 2]),
            vec![
                action("set_y", &[(0, 0)], &[(1, 1)]),
                action("fix_x", &[(1, 0)], &[(0, 0)]),
            ],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(0, 0), Fact::new(1, 1)],
            ScopeConfig {
                causal_links: true,
                ..ScopeConfig::default()
            },
        );
        let relevance = scoper.run().unwrap();
        // fix_x achieves x=0 but never becomes relevant; x=0 is still
        // reported as a precondition of set_y.
        assert_eq!(relevance.action_names(), vec!["set_y"]);
        assert_eq!(relevance.facts, facts(&[(0, 0), (1, 1)]));
    }

    #[test]
    fn test_causal_links_keep_preconditions_of_relevant_actions() {
        // set_y needs x=0, which nothing threatens.
        let scoper = Scoper::new(
            FactSet::domains(&[2, 2]),
            vec![action("set_y", &[(0, 0), (1, 0)], &[(1, 1)])],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(1, 1)],
            ScopeConfig {
                causal_links: true,
                ..ScopeConfig::default()
            },
        );
        let relevance = scoper.run().unwrap();
        assert_eq!(relevance.facts, facts(&[(0, 0), (1, 0), (1, 1)]));
        for action in &relevance.actions {
            for c in action.precondition() {
                assert!(relevance.facts.contains(c.fact().unwrap()), "{action}");
            }
        }
    }

    #[test]
    fn test_resume_rejects_unknown_action() {
        let scoper = counter(ScopeConfig::default());
        let mut snapshot = scoper.initial_snapshot();
        snapshot.actions.insert(99);
        assert_eq!(
            scoper.resume(snapshot.clone()).unwrap_err(),
            ScopeError::UnknownAction {
                id: 99,
                num_actions: 4
            }
        );
        assert!(scoper.step(&snapshot).is_err());
    }

    #[test]
    fn test_causal_links_keep_threatened_init() {
        // clobber writes x=1, so x=0 is threatened once clobber is relevant.
        let scoper = Scoper::new(
            FactSet::domains(&[2, 2]),
            vec![
                action("clobber", &[(0, 0)], &[(0, 1), (1, 1)]),
                action("restore", &[(0, 1)], &[(0, 0)]),
            ],
            vec![Fact::new(0, 0), Fact::new(1, 0)],
            vec![Fact::new(1, 1)],
            ScopeConfig {
                causal_links: true,
                ..ScopeConfig::default()
            },
        );
        let relevance = scoper.run().unwrap();
        assert_eq!(relevance.action_names(), vec!["clobber", "restore"]);
        assert!(relevance.facts.contains(Fact::new(0, 0)));
    }
}
