// tests/property_scheduler.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use taskgraph::dag::{Action, TaskHandle, TaskManager};
use taskgraph_test_utils::init_tracing;
use taskgraph_test_utils::pools::ThreadPerJobPool;
use taskgraph_test_utils::recorder::Recorder;

/// A random acyclic graph: task N may only depend on tasks 0..N-1.
#[derive(Debug, Clone)]
struct GraphSpec {
    deps: Vec<BTreeSet<usize>>,
    failing: BTreeSet<usize>,
}

fn graph_strategy(max_tasks: usize) -> impl Strategy<Value = GraphSpec> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );
        let failing = proptest::collection::btree_set(0..num_tasks, 0..=num_tasks / 2);

        (deps, failing).prop_map(|(raw_deps, failing)| {
            // Sanitize dependencies: only allow deps < i
            let deps = raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect();
            GraphSpec { deps, failing }
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_task_runs_once_after_its_prerequisites(spec in graph_strategy(12)) {
        init_tracing();
        let rec = Recorder::new();
        let mut manager = TaskManager::new(Arc::new(ThreadPerJobPool::new()))
            .with_poll_interval(Duration::from_millis(10));

        let mut handles: Vec<TaskHandle> = Vec::new();
        for (i, deps) in spec.deps.iter().enumerate() {
            let prerequisites: Vec<TaskHandle> = deps.iter().map(|&d| handles[d]).collect();
            let action: Action = if spec.failing.contains(&i) {
                Box::new(rec.failing_action(&name(i)))
            } else {
                Box::new(rec.action(&name(i)))
            };
            handles.push(manager.get_or_create(name(i), action, &prerequisites).unwrap());
        }

        let failures = manager.run_and_wait().unwrap();

        for (i, deps) in spec.deps.iter().enumerate() {
            prop_assert_eq!(rec.times_started(&name(i)), 1);
            let state = manager.state_of(handles[i]).unwrap();
            prop_assert!(state.is_terminal(), "task_{} ended in {:?}", i, state);
            for &d in deps {
                rec.assert_started_after_finished(&name(i), &name(d));
            }
        }

        let failed: BTreeSet<String> = failures.iter().map(|f| f.task.clone()).collect();
        let expected: BTreeSet<String> = spec.failing.iter().map(|&i| name(i)).collect();
        prop_assert_eq!(failed, expected);
        prop_assert_eq!(manager.tracker().in_flight().unwrap(), 0);
        prop_assert_eq!(manager.tracker().completed().unwrap(), spec.deps.len());
    }
}
