// src/engine/execution.rs

//! Execution snapshot model.
//!
//! These are the only types callers see when they query an execution. The
//! coordinator owns the live copy and publishes clones, so a snapshot never
//! changes after it has been handed out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::JobError;
use crate::types::{ExecutionStatus, JobConfig, JobId, JobStatus};

/// One line written through [`crate::exec::ExecutionContext::log`], or by the
/// coordinator itself (attempt and retry notices).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub attempt: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub id: JobId,
    pub name: String,
    pub job_type: String,
    pub status: JobStatus,
    /// Attempts started so far (0 until the handler is first invoked).
    pub attempt: u32,
    /// Last value reported by the handler, 0–100.
    pub progress: f64,
    pub logs: Vec<LogEntry>,
    pub output: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub skip_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobState {
    pub fn pending(job: &JobConfig) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            job_type: job.job_type.clone(),
            status: JobStatus::Pending,
            attempt: 0,
            progress: 0.0,
            logs: Vec::new(),
            output: None,
            error: None,
            skip_reason: None,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub id: String,
    pub name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once cancellation was requested.
    pub cancelled: bool,
    /// Job ids in submission order.
    pub order: Vec<JobId>,
    pub jobs: HashMap<JobId, JobState>,
}

impl Execution {
    pub fn new(id: String, name: String, jobs: &[JobConfig]) -> Self {
        Self {
            id,
            name,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            cancelled: false,
            order: jobs.iter().map(|j| j.id.clone()).collect(),
            jobs: jobs
                .iter()
                .map(|j| (j.id.clone(), JobState::pending(j)))
                .collect(),
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobState> {
        self.jobs.get(id)
    }

    /// Job states in submission order.
    pub fn jobs_in_order(&self) -> impl Iterator<Item = &JobState> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Ids of jobs currently in `status`, in submission order.
    pub fn ids_with_status(&self, status: JobStatus) -> Vec<&str> {
        self.jobs_in_order()
            .filter(|j| j.status == status)
            .map(|j| j.id.as_str())
            .collect()
    }

    pub(crate) fn job_mut(&mut self, id: &str) -> Option<&mut JobState> {
        self.jobs.get_mut(id)
    }
}
