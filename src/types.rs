// src/types.rs

//! Shared job and execution types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical job identifier type used throughout the crate.
pub type JobId = String;

/// Lifecycle state of a single job within one execution.
///
/// - `Pending`: waiting for dependencies (or for a free parallelism slot).
/// - `Running`: dispatched; retries stay in this state.
/// - `Completed` / `Failed`: terminal outcome of running the job.
/// - `Skipped`: terminal, never dispatched (an upstream job failed or the
///   execution was cancelled before the job became ready).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Aggregate status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    PartiallyFailed,
}

impl ExecutionStatus {
    /// Final status once every job is terminal.
    ///
    /// - every job completed → `Completed`
    /// - nothing completed and at least one job failed → `Failed`
    /// - any other mix of completed, failed and skipped → `PartiallyFailed`
    ///
    /// A run cancelled before anything was dispatched (every job skipped)
    /// is therefore `PartiallyFailed`, not `Failed`.
    pub fn settle(completed: usize, failed: usize, total: usize) -> Self {
        if completed == total {
            ExecutionStatus::Completed
        } else if completed == 0 && failed > 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::PartiallyFailed
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::PartiallyFailed => "partially_failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "partially_failed" => Ok(ExecutionStatus::PartiallyFailed),
            other => Err(format!("invalid execution status: {other}")),
        }
    }
}

/// Retry policy for one job.
///
/// A job makes at most `max_retries + 1` attempts. The delay before retry
/// `n` (1-based) is `retry_delay_ms * backoff_multiplier^(n - 1)`; with the
/// default multiplier of `1.0` the delay is constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, retry_delay_ms: u64) -> Self {
        Self {
            max_retries,
            retry_delay_ms,
            backoff_multiplier: default_backoff_multiplier(),
        }
    }

    pub fn with_backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Total number of attempts a job may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() && self.backoff_multiplier > 0.0 {
            self.backoff_multiplier
        } else {
            1.0
        };
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.retry_delay_ms as f64 * multiplier.powi(exponent);
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }
}

/// A job as submitted by the caller. Immutable once an execution starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: JobId,
    pub name: String,
    /// Key into the handler registry.
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub depends_on: Vec<JobId>,
    /// Opaque payload handed verbatim to the handler.
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-attempt timeout; `None` means the attempt may run indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl JobConfig {
    /// Job with no dependencies, no retries and no timeout. `name` defaults to `id`.
    pub fn new(id: impl Into<JobId>, job_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            job_type: job_type.into(),
            depends_on: Vec::new(),
            config: serde_json::Value::Null,
            retry: RetryConfig::new(0, 0),
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
