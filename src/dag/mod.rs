// src/dag/mod.rs

//! Job graph validation and scheduling.
//!
//! - [`graph`] validates a submitted job list and holds the resulting DAG.
//! - [`scheduler`] contains the per-execution state machine that decides
//!   which jobs are ready, bounds concurrency, and cascades failures.
//! - [`job_info`] provides per-job scheduling state and dispatch types.
//! - [`scheduler_step`] defines the result type for scheduler transitions.
//! - [`state_manager`] applies transitions that span several jobs.

pub mod graph;
pub mod job_info;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::DagGraph;
pub use job_info::ScheduledJob;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
