// src/dag/job_info.rs

//! Per-job scheduling state.

use crate::types::{JobId, JobStatus};

/// Scheduling state of a job (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on dependencies or on a free parallelism slot.
    Pending,
    /// Handed to the coordinator for execution (retries included).
    Running,
    Completed,
    Failed,
    /// Never dispatched: an upstream job failed, or the execution was
    /// cancelled before the job got a slot.
    Skipped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Skipped
        )
    }
}

impl From<RunState> for JobStatus {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Pending => JobStatus::Pending,
            RunState::Running => JobStatus::Running,
            RunState::Completed => JobStatus::Completed,
            RunState::Failed => JobStatus::Failed,
            RunState::Skipped => JobStatus::Skipped,
        }
    }
}

/// What the scheduler tracks for one job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: JobId,
    pub run_state: RunState,
    /// Dependencies that have not completed yet. The job becomes ready when
    /// this reaches zero.
    pub unmet_deps: usize,
}

impl JobInfo {
    pub fn new(id: JobId, dep_count: usize) -> Self {
        Self {
            id,
            run_state: RunState::Pending,
            unmet_deps: dep_count,
        }
    }
}

/// A job the scheduler wants started now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: JobId,
    /// Position of the job in the submitted list.
    pub index: usize,
}
