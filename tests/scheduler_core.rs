// tests/scheduler_core.rs

//! The scheduler is a pure state machine; these tests drive it by hand.

use jobdag::dag::{DagGraph, Scheduler};
use jobdag::types::{ExecutionStatus, JobConfig, JobStatus};
use jobdag_test_utils::builders::{chain, job};

fn scheduler(jobs: &[JobConfig], parallelism: usize) -> Scheduler {
    Scheduler::new(DagGraph::build(jobs).unwrap(), parallelism)
}

fn ids(batch: &[jobdag::dag::ScheduledJob]) -> Vec<&str> {
    batch.iter().map(|s| s.id.as_str()).collect()
}

#[test]
fn ready_jobs_are_dispatched_in_submission_order() {
    let jobs = vec![job("z", "t").build(), job("a", "t").build(), job("m", "t").build()];
    let mut s = scheduler(&jobs, 1);

    let mut order = Vec::new();
    while !s.is_finished() {
        let batch = s.dispatch_ready();
        assert_eq!(batch.len(), 1);
        order.push(batch[0].id.clone());
        s.complete(&batch[0].id);
    }

    assert_eq!(order, vec!["z", "a", "m"]);
    assert_eq!(s.execution_status(), ExecutionStatus::Completed);
}

#[test]
fn dispatch_never_exceeds_parallelism() {
    let jobs: Vec<JobConfig> = (0..5).map(|i| job(&format!("j{i}"), "t").build()).collect();
    let mut s = scheduler(&jobs, 2);

    let first = s.dispatch_ready();
    assert_eq!(ids(&first), vec!["j0", "j1"]);
    assert_eq!(s.running_count(), 2);
    assert!(s.dispatch_ready().is_empty());

    s.complete("j1");
    let next = s.dispatch_ready();
    assert_eq!(ids(&next), vec!["j2"]);
    assert_eq!(s.running_count(), 2);
}

#[test]
fn dependents_wait_for_every_dependency() {
    let jobs = vec![
        job("a", "t").build(),
        job("b", "t").build(),
        job("c", "t").after("a").after("b").build(),
    ];
    let mut s = scheduler(&jobs, 4);

    assert_eq!(ids(&s.dispatch_ready()), vec!["a", "b"]);
    assert_eq!(s.deps_satisfied("c"), Some(false));

    s.complete("a");
    assert!(s.dispatch_ready().is_empty());
    assert_eq!(s.status_of("c"), Some(JobStatus::Pending));

    s.complete("b");
    assert_eq!(s.deps_satisfied("c"), Some(true));
    assert_eq!(ids(&s.dispatch_ready()), vec!["c"]);
    assert_eq!(s.status_of("c"), Some(JobStatus::Running));
    assert_eq!(s.deps_satisfied("ghost"), None);
}

#[test]
fn failure_skips_all_transitive_dependents_only() {
    // a -> b -> c, a -> d, e independent
    let jobs = vec![
        job("a", "t").build(),
        job("b", "t").after("a").build(),
        job("c", "t").after("b").build(),
        job("d", "t").after("a").build(),
        job("e", "t").build(),
    ];
    let mut s = scheduler(&jobs, 2);

    assert_eq!(ids(&s.dispatch_ready()), vec!["a", "e"]);

    let step = s.fail("a");
    let mut skipped = step.newly_skipped.clone();
    skipped.sort();
    assert_eq!(skipped, vec!["b", "c", "d"]);
    assert!(!step.run_finished);

    for id in ["b", "c", "d"] {
        assert_eq!(s.status_of(id), Some(JobStatus::Skipped));
    }
    assert!(s.dispatch_ready().is_empty());

    let step = s.complete("e");
    assert!(step.run_finished);
    assert_eq!(s.count(JobStatus::Skipped), 3);
    assert_eq!(s.execution_status(), ExecutionStatus::PartiallyFailed);
}

#[test]
fn shared_descendant_is_skipped_once() {
    let jobs = vec![
        job("a", "t").build(),
        job("b", "t").build(),
        job("c", "t").after("a").after("b").build(),
    ];
    let mut s = scheduler(&jobs, 2);
    s.dispatch_ready();

    assert_eq!(s.fail("a").newly_skipped, vec!["c"]);
    assert!(s.fail("b").newly_skipped.is_empty());
    assert_eq!(s.execution_status(), ExecutionStatus::Failed);
}

#[test]
fn completion_of_unknown_or_idle_job_is_ignored() {
    let mut s = scheduler(&chain(&["a", "b"], "t"), 1);

    s.complete("ghost");
    s.complete("b");
    assert_eq!(s.status_of("b"), Some(JobStatus::Pending));
    assert_eq!(s.running_count(), 0);
}

#[test]
fn cancel_stops_dispatch_and_skips_pending_jobs() {
    let jobs = vec![job("a", "t").build(), job("b", "t").build(), job("c", "t").after("a").build()];
    let mut s = scheduler(&jobs, 1);

    assert_eq!(ids(&s.dispatch_ready()), vec!["a"]);

    let step = s.cancel();
    assert_eq!(step.newly_skipped, vec!["b", "c"]);
    assert!(s.is_cancelled());
    assert!(!s.is_finished(), "a is still running");

    // Running job settles normally; nothing new is dispatched.
    s.complete("a");
    assert!(s.dispatch_ready().is_empty());
    assert!(s.is_finished());
    assert_eq!(s.finished_count(), 3);
    assert_eq!(s.execution_status(), ExecutionStatus::PartiallyFailed);

    assert!(s.cancel().newly_skipped.is_empty());
}

#[test]
fn zero_parallelism_is_clamped_to_one() {
    let s = scheduler(&chain(&["a"], "t"), 0);
    assert_eq!(s.parallelism(), 1);
}

#[test]
fn cancel_before_dispatch_is_not_a_failure() {
    let mut s = scheduler(&chain(&["a", "b"], "t"), 1);

    assert_eq!(s.cancel().newly_skipped, vec!["a", "b"]);
    assert!(s.dispatch_ready().is_empty());
    assert!(s.is_finished());
    assert_eq!(s.count(JobStatus::Failed), 0);
    assert_eq!(s.execution_status(), ExecutionStatus::PartiallyFailed);
}
