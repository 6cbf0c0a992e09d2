//! Properties of causal-link filtering.

use fdscope_core::{filter_causally_linked, unthreatened_init_facts, FactSet, VarValAction};
use fdscope_soundness::arb_task;
use fdscope_task::FdTask;
use proptest::prelude::*;

fn actions(task: &FdTask) -> Vec<VarValAction> {
    task.operators
        .iter()
        .map(|op| VarValAction::from_operator(op).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn only_unthreatened_init_facts_are_dropped(task in arb_task(), take in 0usize..=8) {
        let actions = actions(&task);
        let active = &actions[..take.min(actions.len())];
        let init = task.init_facts();
        let all = FactSet::domains(&task.ranges());
        let filtered = filter_causally_linked(&all, &init, active);

        prop_assert!(filtered.is_subset(&all));
        for fact in all.iter_facts() {
            let threatened = active
                .iter()
                .any(|a| a.effects().iter().any(|e| e.var == fact.var && e.val != fact.val));
            let dropped = !filtered.contains(fact);
            prop_assert_eq!(dropped, init.contains(&fact) && !threatened, "{}", fact);
        }
    }

    #[test]
    fn more_actions_threaten_more(task in arb_task(), take in 0usize..=8) {
        let actions = actions(&task);
        let init = task.init_facts();
        let fewer = unthreatened_init_facts(&init, &actions[..take.min(actions.len())]);
        let more = unthreatened_init_facts(&init, &actions);
        prop_assert!(more.is_subset(&fewer));
    }

    #[test]
    fn filtering_is_idempotent(task in arb_task()) {
        let actions = actions(&task);
        let init = task.init_facts();
        let all = FactSet::domains(&task.ranges());
        let once = filter_causally_linked(&all, &init, &actions);
        let twice = filter_causally_linked(&once, &init, &actions);
        prop_assert_eq!(once, twice);
    }
}
