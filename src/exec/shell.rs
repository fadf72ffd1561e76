// src/exec/shell.rs

//! Built-in `shell` job type.
//!
//! Config:
//!
//! ```toml
//! config = { cmd = "python train.py", progress_regex = "^progress: (\\d+)%" }
//! ```
//!
//! - `cmd` runs through `sh -c` (`cmd /C` on Windows).
//! - Every stdout line is forwarded to the job log.
//! - If `progress_regex` is set, its first capture group on a stdout line is
//!   parsed as a percentage and reported as job progress.
//! - Non-zero exit is a handler error. Output is
//!   `{"exit_code": <i32>, "last_line": <last stdout line or null>}`.

use std::collections::BTreeMap;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::{ExecutionContext, JobFuture, JobHandler};

/// Job type name the binary registers [`ShellHandler`] under.
pub const SHELL_JOB_TYPE: &str = "shell";

#[derive(Debug, Clone, Deserialize)]
struct ShellJobConfig {
    cmd: String,
    #[serde(default)]
    progress_regex: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Runs a shell command per attempt.
#[derive(Debug, Clone, Default)]
pub struct ShellHandler;

impl JobHandler for ShellHandler {
    fn execute(&self, config: serde_json::Value, ctx: ExecutionContext) -> JobFuture {
        Box::pin(run_shell_job(config, ctx))
    }
}

async fn run_shell_job(config: serde_json::Value, ctx: ExecutionContext) -> Result<serde_json::Value> {
    let cfg: ShellJobConfig =
        serde_json::from_value(config).context("invalid shell job config (expected { cmd = \"...\" })")?;

    let progress = cfg
        .progress_regex
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid progress_regex")?;

    info!(
        job = %ctx.job_id(),
        attempt = ctx.attempt(),
        cmd = %cfg.cmd,
        "starting shell job process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cfg.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cfg.cmd);
        c
    };

    cmd.envs(&cfg.env)
        .env("JOBDAG_EXECUTION_ID", ctx.execution_id())
        .env("JOBDAG_JOB_ID", ctx.job_id())
        .env("JOBDAG_ATTEMPT", ctx.attempt().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A timed-out attempt drops this future; the process must go with it.
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for job '{}'", ctx.job_id()))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let job = ctx.job_id().to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = %job, "stderr: {}", line);
            }
        });
    }

    let mut last_line = None;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("reading stdout of job '{}'", ctx.job_id()))?
        {
            if let Some(percent) = progress.as_ref().and_then(|re| parse_progress(re, &line)) {
                ctx.update_progress(percent);
            }
            ctx.log(line.clone());
            last_line = Some(line);
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of job '{}'", ctx.job_id()))?;
    let code = status.code().unwrap_or(-1);

    info!(
        job = %ctx.job_id(),
        attempt = ctx.attempt(),
        exit_code = code,
        success = status.success(),
        "shell job process exited"
    );

    if !status.success() {
        bail!("command `{}` exited with status {}", cfg.cmd, code);
    }

    Ok(serde_json::json!({
        "exit_code": code,
        "last_line": last_line,
    }))
}

/// First capture group of `re` on `line`, as a number.
fn parse_progress(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)?.get(1)?.as_str().trim().parse().ok()
}
