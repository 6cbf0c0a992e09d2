#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(task) = serde_json::from_slice::<fdscope_task::FdTask>(data) {
        let small = task.variables.len() <= 8 && task.variables.iter().all(|v| v.range <= 4);
        if small && fdscope_task::validate(&task).is_ok() {
            for merging in [false, true] {
                let config = fdscope_core::ScopeConfig {
                    merging,
                    causal_links: merging,
                    ..fdscope_core::ScopeConfig::default()
                };
                if let Ok((scoped, relevance)) = fdscope_core::scope_task(&task, &config) {
                    assert!(fdscope_task::validate(&scoped).is_ok());
                    assert!(relevance.iterations <= task.num_facts() + task.operators.len() + 2);
                }
            }
        }
    }
});
