// src/dag/scheduler_step.rs

//! Result type for scheduler transitions.

use crate::types::JobId;

/// What changed as a result of a single settlement or cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Jobs newly marked `Skipped` in this step (cascade or cancellation).
    pub newly_skipped: Vec<JobId>,
    /// Whether this step left every job in a terminal state.
    pub run_finished: bool,
}
