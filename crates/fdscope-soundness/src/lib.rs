use fdscope_core::{
    Condition, FactSet, Granularity, Relevance, ScopeConfig, Scoper, Snapshot, VarValAction,
};
use fdscope_task::{FdOperator, FdTask, FdVariable, Fact, PrePost, PreValue};
use proptest::prelude::*;

/// Random valid tasks: up to four variables with two or three values each,
/// up to eight operators without conditional effects.
pub fn arb_task() -> impl Strategy<Value = FdTask> {
    prop::collection::vec(2usize..=3, 1..=4)
        .prop_flat_map(|ranges| {
            let init: Vec<_> = ranges.iter().map(|&r| 0..r).collect();
            let goal: Vec<_> = ranges
                .iter()
                .map(|&r| prop::option::of(0..r))
                .collect();
            let operators = prop::collection::vec(arb_operator(ranges.clone()), 0..=8);
            (Just(ranges), init, goal, operators)
        })
        .prop_map(|(ranges, init, goal, operators)| FdTask {
            variables: ranges
                .iter()
                .enumerate()
                .map(|(i, &r)| FdVariable::new(format!("v{i}"), r))
                .collect(),
            init,
            goal: goal
                .into_iter()
                .enumerate()
                .filter_map(|(var, val)| val.map(|val| Fact::new(var, val)))
                .collect(),
            operators: operators
                .into_iter()
                .enumerate()
                .map(|(i, mut op)| {
                    op.name = format!("op{i}");
                    op
                })
                .collect(),
            metric: false,
        })
}

/// Per variable: untouched, prevail, effect from anywhere, or effect from a
/// given value.
fn arb_operator(ranges: Vec<usize>) -> impl Strategy<Value = FdOperator> {
    let roles: Vec<_> = ranges
        .iter()
        .map(|&r| (0u8..4, 0..r, 0..r))
        .collect();
    (roles, 1u32..=2).prop_map(|(roles, cost)| {
        let mut prevail = Vec::new();
        let mut pre_post = Vec::new();
        for (var, (role, a, b)) in roles.into_iter().enumerate() {
            match role {
                1 => prevail.push(Fact::new(var, a)),
                2 => pre_post.push(PrePost::new(var, PreValue::Any, b)),
                3 => pre_post.push(PrePost::new(var, PreValue::Value(a), b)),
                _ => {}
            }
        }
        FdOperator::new("", prevail, pre_post, cost)
    })
}

/// A domain table and a family of actions sharing one effect and cost.
/// Preconditions range over every variable but the last, which holds the
/// shared effect.
pub fn arb_family() -> impl Strategy<Value = (FactSet, Vec<VarValAction>)> {
    prop::collection::vec(2usize..=3, 1..=4)
        .prop_flat_map(|ranges| {
            let member: Vec<_> = ranges.iter().map(|&r| (0u8..3, 0..r)).collect();
            (Just(ranges), prop::collection::vec(member, 1..=4))
        })
        .prop_map(|(mut ranges, members)| {
            let target = ranges.len();
            ranges.push(2);
            let family = members
                .into_iter()
                .enumerate()
                .map(|(i, conds)| {
                    let precondition: Vec<Condition> = conds
                        .into_iter()
                        .enumerate()
                        .filter_map(|(var, (kind, val))| match kind {
                            1 => Some(Condition::any(var)),
                            2 => Some(Condition::exactly(var, val)),
                            _ => None,
                        })
                        .collect();
                    VarValAction::new(format!("m{i}"), precondition, [Fact::new(target, 1)], 1)
                })
                .collect();
            (FactSet::domains(&ranges), family)
        })
}

/// Every combination of merging, causal links and granularity, sequential.
pub fn config_matrix() -> Vec<ScopeConfig> {
    let mut configs = Vec::new();
    for merging in [false, true] {
        for causal_links in [false, true] {
            for granularity in [Granularity::Values, Granularity::Variables] {
                configs.push(ScopeConfig {
                    merging,
                    causal_links,
                    granularity,
                    ..ScopeConfig::default()
                });
            }
        }
    }
    configs
}

pub fn run_scoper(task: &FdTask, config: ScopeConfig) -> Result<(Scoper, Relevance), String> {
    let scoper = Scoper::from_task(task, config).map_err(|e| e.to_string())?;
    let relevance = scoper.run().map_err(|e| e.to_string())?;
    Ok((scoper, relevance))
}

/// Every snapshot from the goal up to the first repeated one.
pub fn trajectory(scoper: &Scoper) -> Result<Vec<Snapshot>, String> {
    let limit = scoper.domains().num_facts() + scoper.actions().len() + 2;
    let mut snapshots = vec![scoper.initial_snapshot()];
    for _ in 0..limit {
        let Some(last) = snapshots.last() else {
            break;
        };
        let next = scoper.step(last).map_err(|e| e.to_string())?;
        let done = next.facts == last.facts && next.actions == last.actions;
        snapshots.push(next);
        if done {
            return Ok(snapshots);
        }
    }
    Err(format!("no fixed point within {limit} steps"))
}
