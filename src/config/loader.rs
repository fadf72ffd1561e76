// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;

/// Parse a pipeline file into a `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** check the job
/// graph. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

/// Parse pipeline TOML held in memory.
pub fn parse_str(contents: &str) -> Result<RawPipelineFile> {
    let config: RawPipelineFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a pipeline file and validate it.
///
/// - Reads TOML.
/// - Applies `[default]` values to jobs that don't set their own.
/// - Rejects duplicate ids, unknown `depends_on` references, cycles and
///   `parallelism = 0`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(&path)?;
    PipelineFile::try_from(raw)
}

/// Default pipeline file: `Jobdag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Jobdag.toml")
}
