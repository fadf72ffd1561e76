// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the job scheduler (readiness, parallelism, cascading skips)
//! - the handler registry and the retry/timeout supervisor
//! - the coordinator loop that reacts to:
//!   - attempt starts, log lines and progress from running jobs
//!   - job settlement (output or final error)
//!   - cancellation requests
//!
//! [`runtime`] is the single coordinating task that owns the live
//! [`Execution`]; [`orchestrator`] is the public submission/query surface.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::errors::JobError;
use crate::types::JobId;

pub mod execution;
pub mod orchestrator;
pub mod runtime;

pub use execution::{Execution, JobState, LogEntry};
pub use orchestrator::{ExecutionHandle, Orchestrator};
pub use runtime::Runtime;

/// Events flowing from running jobs into the coordinator.
#[derive(Debug)]
pub enum JobEvent {
    /// The supervisor is about to invoke the handler (1-based attempt).
    AttemptStarted { job: JobId, attempt: u32 },
    /// A log line from the handler or the supervisor.
    Log { job: JobId, entry: LogEntry },
    /// The handler reported progress (already clamped to 0–100).
    Progress { job: JobId, percent: f64 },
    /// The job finished: output on success, final error otherwise.
    Settled {
        job: JobId,
        result: Result<serde_json::Value, JobError>,
    },
}

pub type JobCompleteCallback = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;
pub type JobFailCallback = Arc<dyn Fn(&str, &JobError) + Send + Sync>;
/// Receives `(finished_jobs, total_jobs)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Per-submission options.
#[derive(Clone)]
pub struct ExecutionOptions {
    /// Maximum number of jobs running at once. Must be at least 1.
    pub parallelism: usize,
    pub on_job_complete: Option<JobCompleteCallback>,
    pub on_job_fail: Option<JobFailCallback>,
    pub on_progress: Option<ProgressCallback>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            on_job_complete: None,
            on_job_fail: None,
            on_progress: None,
        }
    }
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("parallelism", &self.parallelism)
            .field("on_job_complete", &self.on_job_complete.is_some())
            .field("on_job_fail", &self.on_job_fail.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl ExecutionOptions {
    pub fn with_parallelism(parallelism: usize) -> Self {
        Self {
            parallelism,
            ..Self::default()
        }
    }

    pub fn on_job_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &serde_json::Value) + Send + Sync + 'static,
    {
        self.on_job_complete = Some(Arc::new(f));
        self
    }

    pub fn on_job_fail<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &JobError) + Send + Sync + 'static,
    {
        self.on_job_fail = Some(Arc::new(f));
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

/// Run a caller-supplied callback, containing any panic it raises.
pub(crate) fn invoke_callback(name: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!(callback = name, "execution callback panicked; ignoring");
    }
}
