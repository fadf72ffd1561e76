// src/dag/scheduler.rs

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::job_info::{JobInfo, RunState, ScheduledJob};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::types::{ExecutionStatus, JobStatus};

/// Scheduler holds the immutable job graph plus mutable per-execution state.
///
/// It is a pure state machine: no tokio, no channels, no clocks. It is
/// responsible for:
/// - deciding which jobs are ready (every dependency completed)
/// - handing out ready jobs in submission order without exceeding the
///   parallelism budget
/// - recording completions and failures
/// - skipping every transitive dependent of a failed job
/// - refusing new dispatches once cancelled
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    jobs: Vec<JobInfo>,
    ready: BTreeSet<usize>,
    parallelism: usize,
    running: usize,
    cancelled: bool,
}

impl Scheduler {
    /// Construct a scheduler for a validated graph. A parallelism of zero is
    /// treated as one.
    pub fn new(graph: DagGraph, parallelism: usize) -> Self {
        let jobs: Vec<JobInfo> = (0..graph.len())
            .map(|i| JobInfo::new(graph.id(i).to_string(), graph.dependencies_of(i).len()))
            .collect();

        let ready = jobs
            .iter()
            .enumerate()
            .filter(|(_, info)| info.unmet_deps == 0)
            .map(|(i, _)| i)
            .collect();

        Self {
            graph,
            jobs,
            ready,
            parallelism: parallelism.max(1),
            running: 0,
            cancelled: false,
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Number of jobs currently dispatched and not yet settled.
    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// `true` once no job is pending or running.
    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|info| info.run_state.is_terminal())
    }

    pub fn status_of(&self, id: &str) -> Option<JobStatus> {
        let idx = self.graph.index_of(id)?;
        Some(self.jobs[idx].run_state.into())
    }

    /// Whether every dependency of `id` has completed.
    ///
    /// Returns `None` if the job is unknown.
    pub fn deps_satisfied(&self, id: &str) -> Option<bool> {
        let idx = self.graph.index_of(id)?;
        Some(
            self.graph
                .dependencies_of(idx)
                .iter()
                .all(|&d| self.jobs[d].run_state == RunState::Completed),
        )
    }

    /// Number of jobs currently in `status`.
    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs
            .iter()
            .filter(|info| JobStatus::from(info.run_state) == status)
            .count()
    }

    /// Number of jobs in a terminal state.
    pub fn finished_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|info| info.run_state.is_terminal())
            .count()
    }

    /// Aggregate status: `Running` until every job is terminal.
    pub fn execution_status(&self) -> ExecutionStatus {
        if !self.is_finished() {
            return ExecutionStatus::Running;
        }
        ExecutionStatus::settle(
            self.count(JobStatus::Completed),
            self.count(JobStatus::Failed),
            self.jobs.len(),
        )
    }

    /// Take ready jobs, earliest submitted first, until the parallelism budget
    /// is used up, and mark them `Running`.
    pub fn dispatch_ready(&mut self) -> Vec<ScheduledJob> {
        let mut scheduled = Vec::new();

        if self.cancelled {
            return scheduled;
        }

        while self.running < self.parallelism {
            let Some(idx) = self.ready.pop_first() else {
                break;
            };

            let info = &mut self.jobs[idx];
            debug_assert_eq!(info.run_state, RunState::Pending);
            info.run_state = RunState::Running;
            self.running += 1;

            debug!(
                job = %info.id,
                running = self.running,
                parallelism = self.parallelism,
                "dependencies satisfied; marking Running"
            );

            scheduled.push(ScheduledJob {
                id: info.id.clone(),
                index: idx,
            });
        }

        scheduled
    }

    /// Record a successful job and release its dependents.
    pub fn complete(&mut self, id: &str) -> SchedulerStep {
        let Some(idx) = self.take_running(id, "completion") else {
            return SchedulerStep::default();
        };

        self.jobs[idx].run_state = RunState::Completed;
        debug!(job = %id, "job completed");

        self.manager().release_dependents(idx);

        SchedulerStep {
            newly_skipped: Vec::new(),
            run_finished: self.is_finished(),
        }
    }

    /// Record a terminally failed job and skip everything downstream of it.
    pub fn fail(&mut self, id: &str) -> SchedulerStep {
        let Some(idx) = self.take_running(id, "failure") else {
            return SchedulerStep::default();
        };

        self.jobs[idx].run_state = RunState::Failed;
        let newly_skipped = self.manager().mark_dependents_skipped(idx);

        if !newly_skipped.is_empty() {
            warn!(
                job = %id,
                skipped = ?newly_skipped,
                "job failed; skipping dependents"
            );
        }

        SchedulerStep {
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Stop dispatching. Jobs already running are left alone; every job still
    /// pending is skipped.
    pub fn cancel(&mut self) -> SchedulerStep {
        if self.cancelled {
            return SchedulerStep {
                newly_skipped: Vec::new(),
                run_finished: self.is_finished(),
            };
        }

        self.cancelled = true;
        let newly_skipped = self.manager().skip_all_pending();

        info!(
            running = self.running,
            skipped = newly_skipped.len(),
            "scheduler cancelled; no further jobs will be dispatched"
        );

        SchedulerStep {
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Resolve `id` to a running job and release its parallelism slot.
    fn take_running(&mut self, id: &str, what: &str) -> Option<usize> {
        let Some(idx) = self.graph.index_of(id) else {
            warn!(job = %id, "{what} for unknown job; ignoring");
            return None;
        };

        if self.jobs[idx].run_state != RunState::Running {
            warn!(
                job = %id,
                state = ?self.jobs[idx].run_state,
                "{what} for job that is not running; ignoring"
            );
            return None;
        }

        self.running -= 1;
        Some(idx)
    }

    fn manager(&mut self) -> StateManager<'_> {
        StateManager::new(&self.graph, &mut self.jobs, &mut self.ready)
    }
}
