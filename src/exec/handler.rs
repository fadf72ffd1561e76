// src/exec/handler.rs

//! Pluggable job handlers.
//!
//! The orchestrator never interprets a job's `config` or output; all domain
//! behaviour lives behind [`JobHandler`]. Handlers are registered by job type
//! in a [`HandlerRegistry`] before an orchestrator is built, so the mapping
//! is fixed (and checked) before any job runs.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{JobError, RegistryError};
use crate::exec::ExecutionContext;

/// Future returned by a handler for one attempt.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send>>;

/// Trait abstracting the work done for one job type.
///
/// Each call is one attempt. The returned future must own everything it
/// needs; the supervisor runs it on its own task so it can be abandoned on
/// timeout.
pub trait JobHandler: Send + Sync {
    fn execute(&self, config: serde_json::Value, ctx: ExecutionContext) -> JobFuture;
}

/// Any `Fn(config, ctx) -> impl Future<Output = anyhow::Result<Value>>` is a handler.
impl<F, Fut> JobHandler for F
where
    F: Fn(serde_json::Value, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
{
    fn execute(&self, config: serde_json::Value, ctx: ExecutionContext) -> JobFuture {
        Box::pin(self(config, ctx))
    }
}

/// Maps job type strings to handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("HandlerRegistry")
            .field("job_types", &types)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_type`.
    ///
    /// Empty (or whitespace-only) job types and a second registration for the
    /// same type are rejected.
    pub fn register<H>(&mut self, job_type: impl Into<String>, handler: H) -> Result<(), RegistryError>
    where
        H: JobHandler + 'static,
    {
        self.register_arc(job_type, Arc::new(handler))
    }

    /// Register an async closure. Same as [`register`](Self::register), but
    /// lets the compiler infer the closure's argument types.
    pub fn register_fn<F, Fut>(&mut self, job_type: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(serde_json::Value, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        self.register(job_type, f)
    }

    /// Like [`register`](Self::register) for an already shared handler.
    pub fn register_arc(
        &mut self,
        job_type: impl Into<String>,
        handler: Arc<dyn JobHandler>,
    ) -> Result<(), RegistryError> {
        let job_type = job_type.into();
        if job_type.trim().is_empty() {
            return Err(RegistryError::EmptyJobType);
        }
        if self.handlers.contains_key(&job_type) {
            return Err(RegistryError::DuplicateHandler(job_type));
        }

        debug!(job_type = %job_type, "registered job handler");
        self.handlers.insert(job_type, handler);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H>(mut self, job_type: impl Into<String>, handler: H) -> Result<Self, RegistryError>
    where
        H: JobHandler + 'static,
    {
        self.register(job_type, handler)?;
        Ok(self)
    }

    pub fn lookup(&self, job_type: &str) -> Result<Arc<dyn JobHandler>, JobError> {
        self.handlers
            .get(job_type)
            .cloned()
            .ok_or_else(|| JobError::MissingHandler(job_type.to_string()))
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}
