// src/exec/supervisor.rs

//! Retry and timeout supervision for a single job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::JobError;
use crate::exec::{ExecutionContext, JobHandler};
use crate::types::RetryConfig;

/// Run `handler` until it succeeds or the retry budget is spent.
///
/// - Each attempt runs on its own Tokio task and is raced against `timeout`;
///   if the timer fires first the attempt is abandoned (its task aborted) and
///   counts as a failed attempt with [`JobError::Timeout`].
/// - A failed attempt `n` is retried while `n <= retry.max_retries`, after
///   sleeping [`RetryConfig::delay_after`]`(n)`. The job therefore makes at
///   most `max_retries + 1` attempts.
/// - The error of the last attempt is returned once retries are exhausted.
pub async fn execute(
    handler: Arc<dyn JobHandler>,
    config: &serde_json::Value,
    context: ExecutionContext,
    retry: &RetryConfig,
    timeout: Option<Duration>,
) -> Result<serde_json::Value, JobError> {
    let max_attempts = retry.max_attempts();
    let mut attempt = 1;

    loop {
        let ctx = context.begin_attempt(attempt);
        ctx.log(format!("attempt {attempt}/{max_attempts} started"));

        let err = match run_attempt(&handler, config.clone(), ctx.clone(), timeout).await {
            Ok(output) => {
                debug!(job = %ctx.job_id(), attempt, "attempt succeeded");
                return Ok(output);
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempt > retry.max_retries {
            ctx.log(format!("attempt {attempt}/{max_attempts} failed: {err}"));
            return Err(err);
        }

        let delay = retry.delay_after(attempt);
        warn!(
            job = %ctx.job_id(),
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed; retrying"
        );
        ctx.log(format!(
            "attempt {attempt}/{max_attempts} failed: {err}; retrying in {} ms",
            delay.as_millis()
        ));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

/// One handler invocation, raced against the timeout.
async fn run_attempt(
    handler: &Arc<dyn JobHandler>,
    config: serde_json::Value,
    ctx: ExecutionContext,
    timeout: Option<Duration>,
) -> Result<serde_json::Value, JobError> {
    // Build the future on the attempt task too, so a handler that panics
    // before returning one is contained like any other panic.
    let handler = Arc::clone(handler);
    let mut task = tokio::spawn(async move { handler.execute(config, ctx).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(JobError::Timeout(limit.as_millis() as u64));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(JobError::from_handler(err)),
        Err(join_err) if join_err.is_panic() => {
            Err(JobError::Handler("handler panicked".to_string()))
        }
        Err(join_err) => Err(JobError::Handler(format!("handler task aborted: {join_err}"))),
    }
}
