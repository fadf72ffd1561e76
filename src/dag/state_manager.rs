// src/dag/state_manager.rs

//! State transitions that touch more than one job.

use std::collections::BTreeSet;

use tracing::debug;

use crate::dag::job_info::{JobInfo, RunState};
use crate::dag::DagGraph;
use crate::types::JobId;

/// Applies readiness and skip propagation across the graph.
///
/// `ready` holds indices of `Pending` jobs whose dependencies have all
/// completed; it is ordered, so the smallest index (earliest submitted)
/// is dispatched first.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    jobs: &'a mut [JobInfo],
    ready: &'a mut BTreeSet<usize>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        jobs: &'a mut [JobInfo],
        ready: &'a mut BTreeSet<usize>,
    ) -> Self {
        Self {
            graph,
            jobs,
            ready,
        }
    }

    /// A dependency completed: count it off for each direct dependent and
    /// mark dependents with no unmet dependencies left as ready.
    pub fn release_dependents(&mut self, completed: usize) {
        let graph = self.graph;
        for &dependent in graph.dependents_of(completed) {
            let info = &mut self.jobs[dependent];
            if info.run_state != RunState::Pending {
                continue;
            }

            info.unmet_deps = info.unmet_deps.saturating_sub(1);
            if info.unmet_deps == 0 {
                debug!(job = %info.id, "dependencies completed; job is ready");
                self.ready.insert(dependent);
            }
        }
    }

    /// Mark every transitive dependent of a failed job as `Skipped`.
    ///
    /// Jobs already skipped are not revisited, so overlapping cascades (two
    /// failed parents sharing descendants) are processed once. Returns the
    /// newly skipped job ids.
    pub fn mark_dependents_skipped(&mut self, failed: usize) -> Vec<JobId> {
        let graph = self.graph;
        let mut stack: Vec<usize> = graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(idx) = stack.pop() {
            let info = &mut self.jobs[idx];
            if info.run_state != RunState::Pending {
                continue;
            }

            info.run_state = RunState::Skipped;
            self.ready.remove(&idx);
            debug!(
                job = %info.id,
                failed = %graph.id(failed),
                "skipping job due to upstream failure"
            );
            newly_skipped.push(info.id.clone());
            stack.extend(graph.dependents_of(idx).iter().copied());
        }

        newly_skipped
    }

    /// Skip every job that has not been dispatched yet.
    pub fn skip_all_pending(&mut self) -> Vec<JobId> {
        self.ready.clear();

        self.jobs
            .iter_mut()
            .filter(|info| info.run_state == RunState::Pending)
            .map(|info| {
                info.run_state = RunState::Skipped;
                info.id.clone()
            })
            .collect()
    }
}
