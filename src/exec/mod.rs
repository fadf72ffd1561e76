// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`handler`] defines the [`JobHandler`] trait and the [`HandlerRegistry`]
//!   mapping job types to handlers.
//! - [`context`] is the per-job [`ExecutionContext`] handlers log, report
//!   progress and read dependency outputs through.
//! - [`supervisor`] wraps one job with per-attempt timeouts and retries.
//! - [`shell`] is the built-in `shell` job type used by the binary.

pub mod context;
pub mod handler;
pub mod shell;
pub mod supervisor;

pub use context::ExecutionContext;
pub use handler::{HandlerRegistry, JobFuture, JobHandler};
pub use shell::{SHELL_JOB_TYPE, ShellHandler};
