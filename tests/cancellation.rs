// tests/cancellation.rs

use std::error::Error;
use std::time::Duration;

use jobdag::engine::{ExecutionOptions, Orchestrator};
use jobdag::exec::{ExecutionContext, HandlerRegistry};
use jobdag::types::{ExecutionStatus, JobStatus};
use jobdag_test_utils::builders::job;
use jobdag_test_utils::handlers::{SCRIPTED, ScriptedHandler};
use jobdag_test_utils::{init_tracing, with_timeout};
use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancel_lets_running_job_finish_and_skips_the_rest() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = Orchestrator::new(HandlerRegistry::new().with(SCRIPTED, handler.clone())?);

    let jobs = vec![
        job("first", SCRIPTED).config(json!({ "sleep_ms": 150 })).build(),
        job("second", SCRIPTED).after("first").build(),
        job("other", SCRIPTED).build(),
    ];

    let handle = orch.submit("cancel-me", jobs, ExecutionOptions::with_parallelism(1))?;
    let id = handle.id().to_string();

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(orch.cancel(&id));

    let execution = with_timeout(handle.wait()).await?;

    assert!(execution.cancelled);
    assert_eq!(execution.job("first").unwrap().status, JobStatus::Completed);
    for id in ["second", "other"] {
        let state = execution.job(id).unwrap();
        assert_eq!(state.status, JobStatus::Skipped);
        assert_eq!(state.skip_reason.as_deref(), Some("execution cancelled"));
    }
    assert_eq!(execution.status, ExecutionStatus::PartiallyFailed);
    assert_eq!(handler.calls.jobs(), vec!["first"]);
    Ok(())
}

#[tokio::test]
async fn handlers_can_observe_cancellation() -> TestResult {
    init_tracing();
    let mut registry = HandlerRegistry::new();
    registry.register_fn("patient", |_config: Value, ctx: ExecutionContext| async move {
        tokio::select! {
            _ = ctx.cancelled() => {
                ctx.log("stopping early");
                Ok::<_, anyhow::Error>(json!({ "stopped": true }))
            }
            _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(json!({ "stopped": false })),
        }
    })?;
    let orch = Orchestrator::new(registry);

    let handle = orch.submit(
        "observe",
        vec![job("p", "patient").build()],
        ExecutionOptions::default(),
    )?;

    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.cancel();

    let execution = with_timeout(handle.wait()).await?;
    let p = execution.job("p").unwrap();
    assert_eq!(p.status, JobStatus::Completed);
    assert_eq!(p.output, Some(json!({ "stopped": true })));
    assert!(p.logs.iter().any(|l| l.message == "stopping early"));
    assert_eq!(execution.status, ExecutionStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn cancel_after_finish_changes_nothing() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = Orchestrator::new(HandlerRegistry::new().with(SCRIPTED, handler.clone())?);

    let handle = orch.submit("done", vec![job("a", SCRIPTED).build()], ExecutionOptions::default())?;
    let id = handle.id().to_string();
    with_timeout(handle.wait()).await?;

    assert!(orch.cancel(&id));
    let execution = orch.get_execution(&id).unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(!execution.cancelled);
    Ok(())
}

#[tokio::test]
async fn cancel_before_first_dispatch_skips_everything() -> TestResult {
    init_tracing();
    let handler = ScriptedHandler::new();
    let orch = Orchestrator::new(HandlerRegistry::new().with(SCRIPTED, handler.clone())?);

    let jobs = vec![
        job("a", SCRIPTED).build(),
        job("b", SCRIPTED).after("a").build(),
    ];

    // The coordinator has not been polled yet on this single-threaded runtime.
    let handle = orch.submit("stillborn", jobs, ExecutionOptions::default())?;
    handle.cancel();

    let execution = with_timeout(handle.wait()).await?;

    assert!(execution.cancelled);
    assert_eq!(execution.ids_with_status(JobStatus::Skipped), vec!["a", "b"]);
    assert!(execution.ids_with_status(JobStatus::Failed).is_empty());
    // Nothing failed, so the run is not reported as failed.
    assert_eq!(execution.status, ExecutionStatus::PartiallyFailed);
    assert!(handler.calls.is_empty());
    Ok(())
}
