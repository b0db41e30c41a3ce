// tests/registration.rs

use std::sync::Arc;

use taskgraph::dag::{RunPhase, TaskManager, TaskState};
use taskgraph::errors::TaskgraphError;
use taskgraph_test_utils::init_tracing;
use taskgraph_test_utils::pools::InlinePool;
use taskgraph_test_utils::recorder::Recorder;

fn inline_manager() -> TaskManager {
    TaskManager::new(Arc::new(InlinePool::new()))
}

#[test]
fn same_identity_returns_the_existing_node() {
    init_tracing();
    let rec = Recorder::new();
    let mut manager = inline_manager();

    let first = manager.get_or_create("load", rec.action("first"), &[]).unwrap();
    let second = manager.get_or_create("load", rec.action("second"), &[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.roots(), &[first]);
    assert_eq!(manager.handle_of("load"), Some(first));
    assert_eq!(manager.name_of(first), Some("load"));

    manager.run_and_wait().unwrap();

    // The action given on re-registration is discarded.
    assert_eq!(rec.started(), vec!["first"]);
}

#[test]
fn prerequisites_accumulate_across_registrations() {
    init_tracing();
    let mut manager = inline_manager();

    let a = manager.get_or_create("A", || Ok(()), &[]).unwrap();
    let b = manager.get_or_create("B", || Ok(()), &[]).unwrap();
    let c = manager.get_or_create("C", || Ok(()), &[a]).unwrap();
    let again = manager.get_or_create("C", || Ok(()), &[b]).unwrap();

    assert_eq!(c, again);
    assert_eq!(manager.prerequisites_of(c), Some(&[a, b][..]));
    assert_eq!(manager.pending_prerequisites_of(c), Some(2));
    assert_eq!(manager.dependents_of(a), Some(&[c][..]));
    assert_eq!(manager.dependents_of(b), Some(&[c][..]));
    assert_eq!(manager.roots(), &[a, b]);
}

#[test]
fn repeated_edge_is_counted_once() {
    init_tracing();
    let rec = Recorder::new();
    let mut manager = inline_manager();

    let a = manager.get_or_create("A", rec.action("A"), &[]).unwrap();
    let b = manager.get_or_create("B", rec.action("B"), &[a, a]).unwrap();
    manager.add_prerequisites(b, &[a]).unwrap();

    assert_eq!(manager.pending_prerequisites_of(b), Some(1));
    assert_eq!(manager.dependents_of(a), Some(&[b][..]));

    let failures = manager.run_and_wait().unwrap();
    assert!(failures.is_empty());
    assert_eq!(rec.started(), vec!["A", "B"]);
}

#[test]
fn nodes_without_prerequisites_are_eligible_before_the_run() {
    init_tracing();
    let mut manager = inline_manager();
    assert_eq!(manager.phase(), RunPhase::Idle);

    let root = manager.get_or_create("root", || Ok(()), &[]).unwrap();
    let child = manager.get_or_create("child", || Ok(()), &[root]).unwrap();

    assert_eq!(manager.phase(), RunPhase::Built);
    assert_eq!(manager.roots(), &[root]);
    assert_eq!(manager.state_of(root), Some(TaskState::Created));
    assert_eq!(manager.pending_prerequisites_of(root), Some(0));
    assert_eq!(manager.state_of(child), Some(TaskState::Waiting));
    assert_eq!(manager.pending_prerequisites_of(child), Some(1));
}

#[test]
fn root_that_gains_a_prerequisite_waits_for_it() {
    init_tracing();
    let rec = Recorder::new();
    let mut manager = inline_manager();

    let late = manager.get_or_create("late", rec.action("late"), &[]).unwrap();
    let first = manager.get_or_create("first", rec.action("first"), &[]).unwrap();
    manager.add_prerequisites(late, &[first]).unwrap();

    assert_eq!(manager.roots(), &[late, first]);

    let failures = manager.run_and_wait().unwrap();

    assert!(failures.is_empty());
    assert_eq!(rec.started(), vec!["first", "late"]);
    assert_eq!(manager.state_of(late), Some(TaskState::Succeeded));
}

#[test]
fn foreign_handles_are_rejected() {
    init_tracing();
    let mut other = inline_manager();
    other.get_or_create("x", || Ok(()), &[]).unwrap();
    other.get_or_create("y", || Ok(()), &[]).unwrap();
    let foreign = other.get_or_create("z", || Ok(()), &[]).unwrap();

    let mut manager = inline_manager();
    let a = manager.get_or_create("A", || Ok(()), &[]).unwrap();

    match manager.get_or_create("B", || Ok(()), &[foreign]) {
        Err(TaskgraphError::UnknownHandle(h)) => assert_eq!(h, foreign),
        result => panic!("expected UnknownHandle, got {result:?}"),
    }
    // Nothing was registered by the failed call.
    assert_eq!(manager.len(), 1);
    assert!(manager.handle_of("B").is_none());

    assert!(matches!(
        manager.add_prerequisites(a, &[foreign]),
        Err(TaskgraphError::UnknownHandle(_))
    ));
    assert!(matches!(
        manager.add_prerequisites(foreign, &[a]),
        Err(TaskgraphError::UnknownHandle(_))
    ));
    assert_eq!(manager.state_of(foreign), None);
}

#[test]
fn manager_runs_exactly_once() {
    init_tracing();
    let rec = Recorder::new();
    let mut manager = inline_manager();

    let a = manager.get_or_create("A", rec.action("A"), &[]).unwrap();
    manager.run_and_wait().unwrap();
    assert_eq!(manager.phase(), RunPhase::Done);

    assert!(matches!(
        manager.run_and_wait(),
        Err(TaskgraphError::AlreadyStarted)
    ));
    assert!(matches!(
        manager.get_or_create("B", || Ok(()), &[]),
        Err(TaskgraphError::AlreadyStarted)
    ));
    assert!(matches!(
        manager.add_prerequisites(a, &[a]),
        Err(TaskgraphError::AlreadyStarted)
    ));

    assert_eq!(rec.times_started("A"), 1);
    // Read access keeps working after the run.
    assert_eq!(manager.state_of(a), Some(TaskState::Succeeded));
    assert_eq!(manager.name_of(a), Some("A"));
}
