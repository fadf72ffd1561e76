// src/config/validate.rs

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::dag::DagGraph;
use crate::errors::{JobdagError, Result, ValidationError};
use crate::types::JobConfig;

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = JobdagError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_execution_section(&raw)?;
        let jobs: Vec<JobConfig> = raw
            .jobs
            .iter()
            .map(|job| job.to_job_config(&raw.default))
            .collect();
        validate_jobs(&jobs)?;
        Ok(PipelineFile::new_unchecked(raw.execution, jobs))
    }
}

fn validate_execution_section(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.execution.parallelism == 0 {
        return Err(ValidationError::InvalidParallelism(0).into());
    }
    if cfg.execution.name.trim().is_empty() {
        return Err(JobdagError::ConfigError(
            "[execution].name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_jobs(jobs: &[JobConfig]) -> Result<()> {
    for job in jobs {
        if job.id.trim().is_empty() {
            return Err(JobdagError::ConfigError(
                "every [[job]] needs a non-empty `id`".to_string(),
            ));
        }
        if job.job_type.trim().is_empty() {
            return Err(JobdagError::ConfigError(format!(
                "job '{}' needs a non-empty `type`",
                job.id
            )));
        }
        if job.timeout_ms == Some(0) {
            return Err(JobdagError::ConfigError(format!(
                "job '{}' has timeout_ms = 0; omit it for no timeout",
                job.id
            )));
        }
    }

    // Same checks a submission goes through: ids, references, cycles.
    DagGraph::build(jobs)?;
    Ok(())
}
