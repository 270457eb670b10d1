use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::{AgentInvocation, AgentRunner, ExecutionResult};
use crate::config::Config;
use crate::errors::OrchestratorError;
use crate::ui::AgentProgress;

/// Process-backed [`AgentRunner`].
///
/// Each invocation is spawned as
/// `<program> -p <command> --max-turns <N> [extra args...]` in the project root, with
/// stdout and stderr both redirected into `<log_dir>/<label>.log`. The capture file is
/// the only channel back from the agent; it is read once the process is gone.
pub struct Watchdog {
    program: String,
    extra_args: Vec<String>,
    working_dir: PathBuf,
    log_dir: PathBuf,
    poll_interval: Duration,
    progress: Arc<AgentProgress>,
}

impl Watchdog {
    pub fn new(program: impl Into<String>, working_dir: &Path, log_dir: &Path) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            working_dir: working_dir.to_path_buf(),
            log_dir: log_dir.to_path_buf(),
            poll_interval: Duration::from_secs(5),
            progress: Arc::new(AgentProgress::hidden()),
        }
    }

    pub fn from_config(config: &Config, progress: Arc<AgentProgress>) -> Self {
        Self::new(&config.agent_cmd, &config.paths.root, &config.paths.log_dir)
            .with_args(config.agent_flags())
            .with_poll_interval(config.poll_interval)
            .with_progress(progress)
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_progress(mut self, progress: Arc<AgentProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Where the combined output of `label` is captured.
    pub fn capture_path(&self, label: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", label))
    }

    fn build_command(&self, invocation: &AgentInvocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-p")
            .arg(&invocation.command)
            .arg("--max-turns")
            .arg(invocation.max_turns.to_string())
            .args(&self.extra_args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

async fn read_capture(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read capture file");
            String::new()
        }
    }
}

async fn captured_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .unwrap_or(0)
}

#[async_trait]
impl AgentRunner for Watchdog {
    #[instrument(skip(self, invocation), fields(label = %invocation.label))]
    async fn run_until(
        &self,
        invocation: &AgentInvocation,
        deadline: Instant,
    ) -> Result<ExecutionResult, OrchestratorError> {
        let capture_path = self.capture_path(&invocation.label);
        let capture_err = |source| OrchestratorError::CaptureFailed {
            path: capture_path.clone(),
            source,
        };
        let stdout = std::fs::File::create(&capture_path).map_err(capture_err)?;
        let stderr = stdout.try_clone().map_err(capture_err)?;

        let mut cmd = self.build_command(invocation);
        cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| OrchestratorError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;
        info!(command = %invocation.command, pid = ?child.id(), "agent started");

        let bar = self.progress.start_task(&invocation.label);
        let mut ticker = tokio::time::interval_at(start + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_len = 0u64;

        let exit = loop {
            tokio::select! {
                status = child.wait() => break Some(status),
                _ = tokio::time::sleep_until(deadline) => break None,
                _ = ticker.tick() => {
                    let len = captured_len(&capture_path).await;
                    let grew = len > last_len;
                    debug!(elapsed_secs = start.elapsed().as_secs(), bytes = len, grew, "agent poll");
                    self.progress.update(&bar, start.elapsed(), len, grew);
                    last_len = len;
                }
            }
        };

        let result = match exit {
            None => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill agent at deadline");
                }
                let duration = start.elapsed();
                warn!(elapsed_secs = duration.as_secs(), "agent killed at deadline");
                ExecutionResult::timed_out(duration, read_capture(&capture_path).await)
            }
            Some(Ok(status)) => {
                let duration = start.elapsed();
                info!(exit_code = ?status.code(), elapsed_secs = duration.as_secs(), "agent exited");
                ExecutionResult::exited(status.code(), duration, read_capture(&capture_path).await)
            }
            Some(Err(e)) => {
                warn!(error = %e, "error waiting for agent process");
                let mut output = read_capture(&capture_path).await;
                output.push_str(&format!("\nwait failed: {}", e));
                ExecutionResult {
                    success: false,
                    timed_out: false,
                    exit_code: None,
                    duration: start.elapsed(),
                    captured_output: output,
                }
            }
        };

        self.progress.finish(&bar, &result);
        Ok(result)
    }
}
