// tests/retry_timeout.rs

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use jobdag::engine::{ExecutionOptions, Orchestrator};
use jobdag::errors::JobError;
use jobdag::exec::{ExecutionContext, HandlerRegistry, JobFuture, JobHandler};
use jobdag::types::{ExecutionStatus, JobStatus, RetryConfig};
use jobdag_test_utils::builders::job;
use jobdag_test_utils::handlers::{SCRIPTED, ScriptedHandler};
use jobdag_test_utils::{init_tracing, with_timeout};
use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn Error>>;

fn orchestrator(handler: &ScriptedHandler) -> Orchestrator {
    Orchestrator::new(HandlerRegistry::new().with(SCRIPTED, handler.clone()).unwrap())
}

#[test]
fn backoff_delays_grow_geometrically() {
    let constant = RetryConfig::new(3, 250);
    assert_eq!(constant.max_attempts(), 4);
    assert_eq!(constant.delay_after(1), Duration::from_millis(250));
    assert_eq!(constant.delay_after(3), Duration::from_millis(250));

    let doubling = RetryConfig::new(3, 100).with_backoff(2.0);
    let delays: Vec<u128> = (1..=3).map(|n| doubling.delay_after(n).as_millis()).collect();
    assert_eq!(delays, vec![100, 200, 400]);

    // Nonsense multipliers fall back to constant delay.
    let broken = RetryConfig::new(1, 10).with_backoff(f64::NAN);
    assert_eq!(broken.delay_after(2), Duration::from_millis(10));
}

#[tokio::test]
async fn flaky_job_succeeds_within_retry_budget() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = orchestrator(&handler);

    let jobs = vec![
        job("flaky", SCRIPTED)
            .config(json!({ "fail_attempts": 2 }))
            .retries(2, 20)
            .build(),
    ];

    let started = Instant::now();
    let handle = orch.submit("flaky", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(handler.calls.attempts("flaky"), 3);
    assert!(started.elapsed() >= Duration::from_millis(40), "two retry delays");

    let state = execution.job("flaky").unwrap();
    assert_eq!(state.attempt, 3);
    assert!(state.error.is_none());
    let retry_notices = state
        .logs
        .iter()
        .filter(|l| l.message.contains("retrying in 20 ms"))
        .count();
    assert_eq!(retry_notices, 2);
    Ok(())
}

#[tokio::test]
async fn attempt_is_abandoned_at_timeout() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = orchestrator(&handler);

    let jobs = vec![
        job("A", SCRIPTED)
            .config(json!({ "sleep_ms": 500 }))
            .timeout_ms(100)
            .build(),
    ];

    let started = Instant::now();
    let handle = orch.submit("timeout", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(450), "took {elapsed:?}");

    let a = execution.job("A").unwrap();
    assert_eq!(a.status, JobStatus::Failed);
    assert_eq!(a.error, Some(JobError::Timeout(100)));
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(handler.calls.attempts("A"), 1);
    Ok(())
}

#[tokio::test]
async fn timed_out_attempts_are_retried() -> TestResult {
    init_tracing();
    let mut registry = HandlerRegistry::new();
    registry.register_fn("warming", |_config: Value, ctx: ExecutionContext| async move {
        // First attempt hangs, second is quick.
        if ctx.attempt() == 1 {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok::<_, anyhow::Error>(json!({ "attempt": ctx.attempt() }))
    })?;
    let orch = Orchestrator::new(registry);

    let jobs = vec![job("w", "warming").timeout_ms(50).retries(1, 0).build()];
    let handle = orch.submit("warm", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let w = execution.job("w").unwrap();
    assert_eq!(w.output, Some(json!({ "attempt": 2 })));
    assert!(w.logs.iter().any(|l| l.message.contains("timed out after 50 ms")));
    Ok(())
}

#[tokio::test]
async fn missing_handler_fails_without_retrying() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = orchestrator(&handler);

    let jobs = vec![
        job("mystery", "unregistered").retries(5, 1_000).build(),
        job("after", SCRIPTED).after("mystery").build(),
    ];

    let started = Instant::now();
    let handle = orch.submit("missing", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;

    assert!(started.elapsed() < Duration::from_millis(900), "no retry delay");
    let m = execution.job("mystery").unwrap();
    assert_eq!(m.status, JobStatus::Failed);
    assert_eq!(m.attempt, 0);
    assert_eq!(
        m.error,
        Some(JobError::MissingHandler("unregistered".to_string()))
    );
    assert_eq!(execution.job("after").unwrap().status, JobStatus::Skipped);
    assert!(handler.calls.is_empty());
    Ok(())
}

#[tokio::test]
async fn panicking_handler_is_an_ordinary_failure() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = orchestrator(&handler);

    let jobs = vec![
        job("boom", SCRIPTED)
            .config(json!({ "panic": true }))
            .retries(1, 0)
            .build(),
        job("fine", SCRIPTED).build(),
    ];

    let handle = orch.submit("panics", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;

    assert_eq!(handler.calls.attempts("boom"), 2);
    assert_eq!(
        execution.job("boom").unwrap().error,
        Some(JobError::Handler("handler panicked".to_string()))
    );
    assert_eq!(execution.job("fine").unwrap().status, JobStatus::Completed);
    assert_eq!(execution.status, ExecutionStatus::PartiallyFailed);
    Ok(())
}

/// Panics in `execute` itself, before any future exists.
struct PanicsWhileBuilding {
    calls: Arc<AtomicUsize>,
}

impl JobHandler for PanicsWhileBuilding {
    fn execute(&self, _config: Value, ctx: ExecutionContext) -> JobFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("cannot build future for {}", ctx.job_id());
    }
}

#[tokio::test]
async fn handler_panicking_before_returning_a_future_still_settles() -> TestResult {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = ScriptedHandler::new();
    let mut registry = HandlerRegistry::new();
    registry.register(
        "eager",
        PanicsWhileBuilding {
            calls: Arc::clone(&calls),
        },
    )?;
    registry.register(SCRIPTED, handler.clone())?;
    let orch = Orchestrator::new(registry);

    let jobs = vec![
        job("A", "eager").retries(1, 0).build(),
        job("B", SCRIPTED).after("A").build(),
    ];

    let handle = orch.submit("eager-panic", jobs, ExecutionOptions::default())?;
    let execution = with_timeout(handle.wait()).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let a = execution.job("A").unwrap();
    assert_eq!(a.status, JobStatus::Failed);
    assert_eq!(a.attempt, 2);
    assert_eq!(a.error, Some(JobError::Handler("handler panicked".to_string())));
    assert_eq!(execution.job("B").unwrap().status, JobStatus::Skipped);
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(handler.calls.is_empty());
    Ok(())
}
