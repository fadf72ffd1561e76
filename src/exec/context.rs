// src/exec/context.rs

//! Per-job handle given to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{JobEvent, LogEntry};
use crate::types::JobId;

/// Handle through which a running job logs, reports progress, and reads the
/// outputs of the jobs it depends on.
///
/// Everything a handler reports is sent to the coordinator over a channel;
/// the context never touches execution state directly. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    execution_id: Arc<str>,
    job_id: JobId,
    attempt: u32,
    dependency_outputs: Arc<HashMap<JobId, Arc<serde_json::Value>>>,
    events: mpsc::UnboundedSender<JobEvent>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// `dependency_outputs` must hold exactly the outputs of the job's
    /// completed dependencies.
    pub fn new(
        execution_id: Arc<str>,
        job_id: JobId,
        dependency_outputs: HashMap<JobId, Arc<serde_json::Value>>,
        events: mpsc::UnboundedSender<JobEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execution_id,
            job_id,
            attempt: 0,
            dependency_outputs: Arc::new(dependency_outputs),
            events,
            cancel,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current attempt, 1-based once the handler has been invoked.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Append a timestamped log line to this job.
    ///
    /// The line is emitted as a tracing event immediately and forwarded to the
    /// coordinator, so it shows up in snapshots while the job is still running.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(
            execution_id = %self.execution_id,
            job = %self.job_id,
            attempt = self.attempt,
            "{message}"
        );
        self.send(JobEvent::Log {
            job: self.job_id.clone(),
            entry: LogEntry {
                at: Utc::now(),
                attempt: self.attempt,
                message,
            },
        });
    }

    /// Report progress as a percentage. Values are clamped to 0–100; NaN is
    /// ignored. May be called any number of times; the last value wins.
    pub fn update_progress(&self, percent: f64) {
        if percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        debug!(job = %self.job_id, percent, "job progress");
        self.send(JobEvent::Progress {
            job: self.job_id.clone(),
            percent,
        });
    }

    /// Output of a completed dependency of this job.
    ///
    /// Returns `None` for any id that is not one of this job's dependencies.
    pub fn get_job_output(&self, job_id: &str) -> Option<&serde_json::Value> {
        self.dependency_outputs.get(job_id).map(|v| v.as_ref())
    }

    /// Ids of the dependencies whose outputs are readable.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependency_outputs.keys().map(|s| s.as_str())
    }

    /// Whether cancellation of the execution was requested.
    ///
    /// Cancellation is cooperative: a running handler is never interrupted,
    /// but may check this and stop early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation of the execution was requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Context for the given attempt; announces the attempt to the coordinator.
    pub(crate) fn begin_attempt(&self, attempt: u32) -> Self {
        let mut ctx = self.clone();
        ctx.attempt = attempt;
        ctx.send(JobEvent::AttemptStarted {
            job: ctx.job_id.clone(),
            attempt,
        });
        ctx
    }

    fn send(&self, event: JobEvent) {
        // The coordinator outlives every job it spawned; a closed channel
        // only happens while the runtime is shutting down.
        if self.events.send(event).is_err() {
            debug!(job = %self.job_id, "coordinator gone; dropping job event");
        }
    }
}
