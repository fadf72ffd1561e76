// tests/scheduler_properties.rs

use std::collections::{BTreeSet, HashSet};

use jobdag::dag::{DagGraph, Scheduler};
use jobdag::types::{ExecutionStatus, JobConfig, JobStatus};
use jobdag_test_utils::builders::job;
use proptest::prelude::*;

// Acyclic by construction: job N may only depend on jobs 0..N.
fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<JobConfig>> {
    (1..=max_jobs).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: BTreeSet<usize> =
                            picks.into_iter().filter(|_| i > 0).map(|p| p % i).collect();
                        deps.into_iter()
                            .fold(job(&format!("j{i}"), "t"), |b, d| b.after(&format!("j{d}")))
                            .build()
                    })
                    .collect()
            },
        )
    })
}

proptest! {
    #[test]
    fn every_run_terminates_within_the_parallelism_bound(
        jobs in dag_strategy(12),
        parallelism in 1usize..4,
        failing in proptest::collection::hash_set(0usize..12, 0..4),
    ) {
        let graph = DagGraph::build(&jobs).unwrap();
        let mut s = Scheduler::new(graph.clone(), parallelism);
        let failing: HashSet<String> = failing.into_iter().map(|i| format!("j{i}")).collect();

        let mut dispatched = HashSet::new();
        let mut steps = 0;

        while !s.is_finished() {
            steps += 1;
            prop_assert!(steps <= jobs.len() * 2, "scheduler did not make progress");

            let batch = s.dispatch_ready();
            prop_assert!(s.running_count() <= parallelism);

            for scheduled in &batch {
                prop_assert!(dispatched.insert(scheduled.id.clone()), "job dispatched twice");
                prop_assert_eq!(s.deps_satisfied(&scheduled.id), Some(true));
            }

            // Settle the oldest running job.
            let Some(next) = batch.first().map(|j| j.id.clone()).or_else(|| {
                jobs.iter()
                    .map(|j| j.id.clone())
                    .find(|id| s.status_of(id) == Some(JobStatus::Running))
            }) else {
                return Err(TestCaseError::fail("nothing running but scheduler not finished"));
            };
            if failing.contains(next.as_str()) {
                s.fail(&next);
            } else {
                s.complete(&next);
            }
        }

        // Skipped jobs are exactly the never-dispatched descendants of failures.
        let mut expected_skipped = HashSet::new();
        for id in &failing {
            if s.status_of(id) == Some(JobStatus::Failed) {
                expected_skipped.extend(graph.descendants_of(id).into_iter().map(str::to_string));
            }
        }
        for j in &jobs {
            let status = s.status_of(&j.id).unwrap();
            prop_assert!(status.is_terminal());
            prop_assert_eq!(status == JobStatus::Skipped, expected_skipped.contains(&j.id));
            prop_assert_eq!(status == JobStatus::Skipped, !dispatched.contains(&j.id));
        }

        prop_assert_ne!(s.execution_status(), ExecutionStatus::Running);
    }
}
