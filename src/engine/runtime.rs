// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::{ScheduledJob, Scheduler};
use crate::errors::JobError;
use crate::exec::{ExecutionContext, HandlerRegistry, supervisor};
use crate::types::{JobConfig, JobId, JobStatus};

use super::{Execution, ExecutionOptions, JobEvent, JobState, invoke_callback};

/// The single coordinating task of one execution.
///
/// It owns the [`Scheduler`] and the live [`Execution`], spawns one Tokio
/// task per dispatched job, and is the only place either is mutated: running
/// jobs report back exclusively through [`JobEvent`]s. After every batch of
/// events a fresh snapshot is published on a `watch` channel.
pub struct Runtime {
    scheduler: Scheduler,
    jobs: Vec<Arc<JobConfig>>,
    execution: Execution,
    execution_id: Arc<str>,
    outputs: HashMap<JobId, Arc<serde_json::Value>>,
    registry: Arc<HandlerRegistry>,
    options: ExecutionOptions,
    event_tx: mpsc::UnboundedSender<JobEvent>,
    event_rx: mpsc::UnboundedReceiver<JobEvent>,
    snapshot_tx: watch::Sender<Execution>,
    cancel: CancellationToken,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("execution_id", &self.execution_id)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// `jobs` must be the list `scheduler` was built from, in the same order.
    pub fn new(
        scheduler: Scheduler,
        jobs: Vec<JobConfig>,
        execution: Execution,
        registry: Arc<HandlerRegistry>,
        options: ExecutionOptions,
        snapshot_tx: watch::Sender<Execution>,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let execution_id: Arc<str> = Arc::from(execution.id.as_str());

        Self {
            scheduler,
            jobs: jobs.into_iter().map(Arc::new).collect(),
            execution,
            execution_id,
            outputs: HashMap::new(),
            registry,
            options,
            event_tx,
            event_rx,
            snapshot_tx,
            cancel,
        }
    }

    /// Main coordinator loop.
    ///
    /// - Dispatches every ready job the parallelism budget allows.
    /// - Waits for job events (or a cancellation request) and applies them.
    /// - Stops once no job is pending or running, then finalizes the
    ///   aggregate status and returns the final snapshot.
    pub async fn run(mut self) -> Execution {
        info!(
            execution_id = %self.execution_id,
            name = %self.execution.name,
            jobs = self.jobs.len(),
            parallelism = self.scheduler.parallelism(),
            "execution_started"
        );

        let cancel = self.cancel.clone();

        loop {
            if cancel.is_cancelled() && !self.scheduler.is_cancelled() {
                self.handle_cancel();
            }

            self.dispatch_ready();
            self.publish();

            if self.scheduler.is_finished() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !self.scheduler.is_cancelled() => {
                    // Handled at the top of the loop.
                }
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        // We hold a sender ourselves, so this cannot happen
                        // while the loop is running.
                        error!(execution_id = %self.execution_id, "job event channel closed");
                        break;
                    };
                    self.handle_event(event);
                    while let Ok(event) = self.event_rx.try_recv() {
                        self.handle_event(event);
                    }
                }
            }
        }

        self.finish()
    }

    fn dispatch_ready(&mut self) {
        for scheduled in self.scheduler.dispatch_ready() {
            self.spawn_job(scheduled);
        }
    }

    fn spawn_job(&mut self, scheduled: ScheduledJob) {
        let job = Arc::clone(&self.jobs[scheduled.index]);

        let dependency_outputs: HashMap<JobId, Arc<serde_json::Value>> = job
            .depends_on
            .iter()
            .filter_map(|dep| {
                self.outputs
                    .get(dep)
                    .map(|out| (dep.clone(), Arc::clone(out)))
            })
            .collect();

        if let Some(state) = self.execution.job_mut(&job.id) {
            state.status = JobStatus::Running;
            state.started_at = Some(Utc::now());
        }

        info!(
            execution_id = %self.execution_id,
            job = %job.id,
            job_type = %job.job_type,
            running = self.scheduler.running_count(),
            "job_started"
        );

        let ctx = ExecutionContext::new(
            Arc::clone(&self.execution_id),
            job.id.clone(),
            dependency_outputs,
            self.event_tx.clone(),
            self.cancel.child_token(),
        );
        let registry = Arc::clone(&self.registry);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = match registry.lookup(&job.job_type) {
                Ok(handler) => {
                    supervisor::execute(handler, &job.config, ctx, &job.retry, job.timeout()).await
                }
                Err(err) => Err(err),
            };

            if tx
                .send(JobEvent::Settled {
                    job: job.id.clone(),
                    result,
                })
                .is_err()
            {
                debug!(job = %job.id, "coordinator gone before job settled");
            }
        });
    }

    fn handle_event(&mut self, event: JobEvent) {
        match event {
            // A settled job's state is final; late events from subtasks
            // that outlived the attempt are dropped.
            JobEvent::AttemptStarted { job, attempt } => {
                if let Some(state) = self.running_job_mut(&job) {
                    state.attempt = attempt;
                }
            }
            JobEvent::Log { job, entry } => match self.running_job_mut(&job) {
                Some(state) => state.logs.push(entry),
                None => debug!(job = %job, "dropping log line for settled job"),
            },
            JobEvent::Progress { job, percent } => {
                if let Some(state) = self.running_job_mut(&job) {
                    state.progress = percent;
                    self.report_progress();
                }
            }
            JobEvent::Settled { job, result } => match result {
                Ok(output) => self.handle_completed(job, output),
                Err(err) => self.handle_failed(job, err),
            },
        }
    }

    fn running_job_mut(&mut self, job: &str) -> Option<&mut JobState> {
        self.execution
            .job_mut(job)
            .filter(|state| state.status == JobStatus::Running)
    }

    fn handle_completed(&mut self, job: JobId, output: serde_json::Value) {
        let step = self.scheduler.complete(&job);

        if let Some(state) = self.execution.job_mut(&job) {
            state.status = JobStatus::Completed;
            state.progress = 100.0;
            state.output = Some(output.clone());
            state.completed_at = Some(Utc::now());
        }

        info!(
            execution_id = %self.execution_id,
            job = %job,
            run_finished = step.run_finished,
            "job_completed"
        );

        if let Some(cb) = &self.options.on_job_complete {
            invoke_callback("on_job_complete", || cb(&job, &output));
        }

        self.outputs.insert(job, Arc::new(output));
        self.report_progress();
    }

    fn handle_failed(&mut self, job: JobId, err: JobError) {
        let step = self.scheduler.fail(&job);

        if let Some(state) = self.execution.job_mut(&job) {
            state.status = JobStatus::Failed;
            state.error = Some(err.clone());
            state.completed_at = Some(Utc::now());
        }

        error!(
            execution_id = %self.execution_id,
            job = %job,
            error = %err,
            skipped = step.newly_skipped.len(),
            "job_failed"
        );

        if let Some(cb) = &self.options.on_job_fail {
            invoke_callback("on_job_fail", || cb(&job, &err));
        }

        let reason = format!("dependency '{job}' failed");
        self.mark_skipped(&step.newly_skipped, &reason);
        self.report_progress();
    }

    fn handle_cancel(&mut self) {
        let step = self.scheduler.cancel();
        self.execution.cancelled = true;

        warn!(
            execution_id = %self.execution_id,
            running = self.scheduler.running_count(),
            skipped = step.newly_skipped.len(),
            "execution cancelled; letting running jobs finish"
        );

        self.mark_skipped(&step.newly_skipped, "execution cancelled");
        if !step.newly_skipped.is_empty() {
            self.report_progress();
        }
    }

    fn mark_skipped(&mut self, jobs: &[JobId], reason: &str) {
        let now = Utc::now();
        for id in jobs {
            if let Some(state) = self.execution.job_mut(id) {
                state.status = JobStatus::Skipped;
                state.skip_reason = Some(reason.to_string());
                state.completed_at = Some(now);
            }
            info!(
                execution_id = %self.execution_id,
                job = %id,
                reason,
                "job_skipped"
            );
        }
    }

    fn report_progress(&self) {
        if let Some(cb) = &self.options.on_progress {
            let finished = self.scheduler.finished_count();
            let total = self.jobs.len();
            invoke_callback("on_progress", || cb(finished, total));
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.execution.clone());
    }

    fn finish(mut self) -> Execution {
        self.execution.status = self.scheduler.execution_status();
        self.execution.completed_at = Some(Utc::now());

        info!(
            execution_id = %self.execution_id,
            status = %self.execution.status,
            completed = self.scheduler.count(JobStatus::Completed),
            failed = self.scheduler.count(JobStatus::Failed),
            skipped = self.scheduler.count(JobStatus::Skipped),
            "execution_finished"
        );

        self.publish();
        self.execution
    }
}
