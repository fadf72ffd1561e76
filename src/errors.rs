// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ValidationError`] rejects a whole submission before anything runs.
//! - [`JobError`] is the terminal (or per-attempt) failure of a single job.
//! - [`RegistryError`] rejects bad handler registrations.
//! - [`JobdagError`] wraps everything for the config loader and the binary.

use serde::Serialize;
use thiserror::Error;

use crate::types::JobId;

#[derive(Error, Debug)]
pub enum JobdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid job graph: {0}")]
    Validation(#[from] ValidationError),

    #[error("Handler registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Execution {0} was not found")]
    ExecutionNotFound(String),

    #[error("Execution task aborted: {0}")]
    Runtime(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reasons a submitted job list is rejected as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job list is empty")]
    NoJobs,

    #[error("parallelism must be >= 1 (got {0})")]
    InvalidParallelism(usize),

    #[error("duplicate job id '{0}'")]
    DuplicateId(JobId),

    #[error("job '{job}' depends on unknown job '{dependency}'")]
    UnknownDependency { job: JobId, dependency: JobId },

    #[error("cycle detected in job graph involving {}", .jobs.join(", "))]
    CycleDetected { jobs: Vec<JobId> },
}

/// Failure of a job attempt, or the final failure of a job.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum JobError {
    /// No handler registered for the job's type. Never retried.
    #[error("no handler registered for job type '{0}'")]
    MissingHandler(String),

    /// The attempt exceeded the job's `timeout_ms`.
    #[error("attempt timed out after {0} ms")]
    Timeout(u64),

    /// The handler returned an error (or panicked).
    #[error("handler failed: {0}")]
    Handler(String),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::MissingHandler(_))
    }

    pub(crate) fn from_handler(err: anyhow::Error) -> Self {
        JobError::Handler(format!("{err:#}"))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("job type must not be empty")]
    EmptyJobType,

    #[error("a handler is already registered for job type '{0}'")]
    DuplicateHandler(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobdagError>;
