// crates/test-utils/src/handlers.rs

//! A configurable fake handler.
//!
//! [`ScriptedHandler`] reads its behaviour from the job's `config`:
//!
//! ```json
//! { "sleep_ms": 50, "fail_attempts": 2, "output": {"rows": 3},
//!   "progress": [25, 50], "log": "hello" }
//! ```
//!
//! - `sleep_ms`: time spent per attempt.
//! - `fail_attempts`: attempts `1..=n` fail; `"always"` fails every attempt.
//! - `output`: returned on success (default `{"job": <id>}`).
//! - `progress`: values passed to `update_progress`, in order.
//! - `log`: one line passed to `log`.
//! - `panic`: if `true`, the attempt panics.
//!
//! Every invocation is recorded in a [`CallLog`] and counted by a
//! [`ConcurrencyProbe`], so tests can assert on ordering and the
//! parallelism bound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use jobdag::exec::{ExecutionContext, JobFuture, JobHandler};
use serde_json::{Value, json};

/// Job type tests register [`ScriptedHandler`] under.
pub const SCRIPTED: &str = "scripted";

/// Shared record of handler invocations, in start order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, u32)>>>,
}

impl CallLog {
    pub fn record(&self, job: &str, attempt: u32) {
        self.calls.lock().unwrap().push((job.to_string(), attempt));
    }

    /// Job ids in invocation order (one entry per attempt).
    pub fn jobs(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(j, _)| j.clone()).collect()
    }

    /// Number of attempts made for `job`.
    pub fn attempts(&self, job: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(j, _)| j == job).count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tracks how many attempts are in flight, and the maximum ever seen.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn enter(&self) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard {
            current: Arc::clone(&self.current),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Leaves the probe when dropped, including when the attempt is aborted.
#[derive(Debug)]
pub struct ProbeGuard {
    current: Arc<AtomicUsize>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedHandler {
    pub calls: CallLog,
    pub probe: ConcurrencyProbe,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobHandler for ScriptedHandler {
    fn execute(&self, config: Value, ctx: ExecutionContext) -> JobFuture {
        let calls = self.calls.clone();
        let probe = self.probe.clone();

        Box::pin(async move {
            calls.record(ctx.job_id(), ctx.attempt());
            let _guard = probe.enter();

            if let Some(line) = config.get("log").and_then(Value::as_str) {
                ctx.log(line);
            }
            if let Some(values) = config.get("progress").and_then(Value::as_array) {
                for v in values.iter().filter_map(Value::as_f64) {
                    ctx.update_progress(v);
                }
            }
            if let Some(ms) = config.get("sleep_ms").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if config.get("panic").and_then(Value::as_bool) == Some(true) {
                panic!("scripted panic in job {}", ctx.job_id());
            }

            let failing = match config.get("fail_attempts") {
                Some(Value::String(s)) if s == "always" => true,
                Some(v) => v.as_u64().is_some_and(|n| u64::from(ctx.attempt()) <= n),
                None => false,
            };
            if failing {
                bail!("scripted failure of {} on attempt {}", ctx.job_id(), ctx.attempt());
            }

            Ok(config
                .get("output")
                .cloned()
                .unwrap_or_else(|| json!({ "job": ctx.job_id() })))
        })
    }
}
