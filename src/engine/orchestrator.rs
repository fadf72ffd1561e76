// src/engine/orchestrator.rs

//! Public submission and query surface.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::dag::{DagGraph, Scheduler};
use crate::errors::{JobdagError, ValidationError};
use crate::exec::HandlerRegistry;
use crate::types::JobConfig;

use super::{Execution, ExecutionOptions, Runtime};

/// Book-keeping for one submitted execution.
struct ExecutionEntry {
    snapshot: watch::Receiver<Execution>,
    cancel: CancellationToken,
}

/// Accepts job lists, runs them, and answers snapshot queries.
///
/// Cloning is cheap; clones share the handler registry and the table of
/// executions.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<HandlerRegistry>,
    executions: Arc<Mutex<HashMap<String, ExecutionEntry>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("executions", &self.table().len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Validate `jobs` and start running them.
    ///
    /// Validation is synchronous and all-or-nothing: on error nothing runs and
    /// no execution is recorded. On success the execution is already running
    /// in the background when this returns. Must be called from within a
    /// Tokio runtime.
    #[instrument(name = "submit", skip_all, fields(jobs = jobs.len()))]
    pub fn submit(
        &self,
        name: impl Into<String>,
        jobs: Vec<JobConfig>,
        options: ExecutionOptions,
    ) -> Result<ExecutionHandle, ValidationError> {
        if options.parallelism == 0 {
            return Err(ValidationError::InvalidParallelism(0));
        }

        let graph = DagGraph::build(&jobs)?;
        let scheduler = Scheduler::new(graph, options.parallelism);

        let id = uuid::Uuid::new_v4().to_string();
        let execution = Execution::new(id.clone(), name.into(), &jobs);
        let (snapshot_tx, snapshot_rx) = watch::channel(execution.clone());
        let cancel = CancellationToken::new();

        info!(execution_id = %id, name = %execution.name, "execution accepted");

        self.table().insert(
            id.clone(),
            ExecutionEntry {
                snapshot: snapshot_rx.clone(),
                cancel: cancel.clone(),
            },
        );

        let runtime = Runtime::new(
            scheduler,
            jobs,
            execution,
            Arc::clone(&self.registry),
            options,
            snapshot_tx,
            cancel.clone(),
        );
        let join = tokio::spawn(runtime.run());

        Ok(ExecutionHandle {
            id,
            snapshot: snapshot_rx,
            cancel,
            join,
        })
    }

    /// Frozen copy of an execution's current state.
    pub fn get_execution(&self, id: &str) -> Option<Execution> {
        self.table()
            .get(id)
            .map(|entry| entry.snapshot.borrow().clone())
    }

    /// Request cooperative cancellation. Returns `false` for unknown ids.
    pub fn cancel(&self, id: &str) -> bool {
        match self.table().get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids of every execution submitted through this orchestrator.
    pub fn list_executions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.table().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Forget a finished execution and return its final snapshot.
    ///
    /// Returns `None` for unknown ids and for executions still running;
    /// those stay in the table.
    pub fn remove_execution(&self, id: &str) -> Option<Execution> {
        let mut table = self.table();
        if !table.get(id)?.snapshot.borrow().is_terminal() {
            return None;
        }
        let entry = table.remove(id)?;
        let execution = entry.snapshot.borrow().clone();
        info!(execution_id = %id, "execution removed");
        Some(execution)
    }

    /// Wait until the execution `id` is terminal and return its final snapshot.
    pub async fn wait_for(&self, id: &str) -> crate::errors::Result<Execution> {
        let mut rx = self
            .table()
            .get(id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| JobdagError::ExecutionNotFound(id.to_string()))?;

        let execution = rx
            .wait_for(|execution| execution.is_terminal())
            .await
            .map_err(|e| JobdagError::Runtime(e.to_string()))?
            .clone();
        Ok(execution)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, ExecutionEntry>> {
        // Entries are plain handles; a panic while holding the lock cannot
        // leave them half-updated.
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running execution, returned by [`Orchestrator::submit`].
#[derive(Debug)]
pub struct ExecutionHandle {
    id: String,
    snapshot: watch::Receiver<Execution>,
    cancel: CancellationToken,
    join: JoinHandle<Execution>,
}

impl ExecutionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Frozen copy of the current state.
    pub fn snapshot(&self) -> Execution {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<Execution> {
        self.snapshot.clone()
    }

    /// Stop dispatching new jobs; running jobs finish normally.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the execution to finish and return the final snapshot.
    pub async fn wait(self) -> crate::errors::Result<Execution> {
        self.join
            .await
            .map_err(|e| JobdagError::Runtime(e.to_string()))
    }
}
