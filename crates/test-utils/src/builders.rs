// crates/test-utils/src/builders.rs

use jobdag::types::{JobConfig, RetryConfig};
use serde_json::Value;

/// Builder for `JobConfig` to simplify test setup.
///
/// Defaults match `JobConfig::new`: no dependencies, no retries, no timeout.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    job: JobConfig,
}

impl JobBuilder {
    pub fn new(id: &str, job_type: &str) -> Self {
        Self {
            job: JobConfig::new(id, job_type),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.depends_on.push(dep.to_string());
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.job.config = config;
        self
    }

    /// `max_retries` retries, `delay_ms` apart, constant backoff.
    pub fn retries(mut self, max_retries: u32, delay_ms: u64) -> Self {
        self.job.retry = RetryConfig::new(max_retries, delay_ms);
        self
    }

    pub fn backoff(mut self, multiplier: f64) -> Self {
        self.job.retry.backoff_multiplier = multiplier;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.job.timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// Shorthand for `JobBuilder::new(id, job_type)`.
pub fn job(id: &str, job_type: &str) -> JobBuilder {
    JobBuilder::new(id, job_type)
}

/// Linear chain `ids[0] -> ids[1] -> ...`, all of type `job_type`.
pub fn chain(ids: &[&str], job_type: &str) -> Vec<JobConfig> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let b = job(id, job_type);
            match i.checked_sub(1) {
                Some(prev) => b.after(ids[prev]).build(),
                None => b.build(),
            }
        })
        .collect()
}
