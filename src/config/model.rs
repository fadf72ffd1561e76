// src/config/model.rs

use serde::Deserialize;

use crate::types::{JobConfig, RetryConfig};

/// Pipeline file as read from TOML, before validation.
///
/// ```toml
/// [execution]
/// name = "nightly"
/// parallelism = 2
///
/// [default]
/// timeout_ms = 3600000
/// retry = { max_retries = 1, retry_delay_ms = 5000 }
///
/// [[job]]
/// id = "prep"
/// type = "shell"
/// config = { cmd = "python prep.py" }
///
/// [[job]]
/// id = "train"
/// type = "shell"
/// depends_on = ["prep"]
/// config = { cmd = "python train.py" }
/// ```
///
/// Jobs are an array of tables so the file order is the submission order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub execution: ExecutionSection,

    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default, rename = "job")]
    pub jobs: Vec<JobSection>,
}

/// `[execution]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_execution_name")]
    pub name: String,

    /// Maximum number of jobs running at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_execution_name() -> String {
    "pipeline".to_string()
}

fn default_parallelism() -> usize {
    1
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            name: default_execution_name(),
            parallelism: default_parallelism(),
        }
    }
}

/// `[default]` section: values applied to jobs that do not set their own.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    #[serde(default)]
    pub retry: Option<RetryConfig>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    pub id: String,

    /// Display name; defaults to `id`.
    #[serde(default)]
    pub name: Option<String>,

    /// Handler type, e.g. `"shell"`.
    #[serde(rename = "type")]
    pub job_type: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Arbitrary table handed to the handler as JSON.
    #[serde(default)]
    pub config: serde_json::Value,

    #[serde(default)]
    pub retry: Option<RetryConfig>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl JobSection {
    /// Resolve the job against `[default]`.
    pub fn to_job_config(&self, defaults: &DefaultSection) -> JobConfig {
        JobConfig {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            job_type: self.job_type.clone(),
            depends_on: self.depends_on.clone(),
            config: self.config.clone(),
            retry: self
                .retry
                .clone()
                .or_else(|| defaults.retry.clone())
                .unwrap_or_default(),
            timeout_ms: self.timeout_ms.or(defaults.timeout_ms),
        }
    }
}

/// A validated pipeline: the job graph is known to be a DAG and
/// `parallelism >= 1`.
///
/// Only constructible through `TryFrom<RawPipelineFile>` (see
/// `config::validate`).
#[derive(Debug, Clone)]
pub struct PipelineFile {
    execution: ExecutionSection,
    jobs: Vec<JobConfig>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(execution: ExecutionSection, jobs: Vec<JobConfig>) -> Self {
        Self { execution, jobs }
    }

    pub fn name(&self) -> &str {
        &self.execution.name
    }

    pub fn parallelism(&self) -> usize {
        self.execution.parallelism
    }

    pub fn jobs(&self) -> &[JobConfig] {
        &self.jobs
    }

    pub fn into_jobs(self) -> Vec<JobConfig> {
        self.jobs
    }
}
