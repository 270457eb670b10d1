//! Parallel preparation: one research→plan chain per phase, all chains concurrent,
//! one deadline for the whole batch.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::agent::{AgentInvocation, AgentRunner, ExecutionResult, deadline_after};
use crate::autopilot_config::render_command;
use crate::phase::{PhaseStatus, PrepStep, build_steps, classify_phase, phase_prefix};

/// Settings for one preparation batch.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Template with a `{phase}` placeholder
    pub research_command: String,
    /// Template with a `{phase}` placeholder
    pub plan_command: String,
    pub max_turns: u32,
    pub skip_research: bool,
    pub skip_planning: bool,
    /// Shared by every chain in the batch
    pub timeout: Duration,
}

impl PrepareOptions {
    fn invocation(&self, phase: u32, step: PrepStep) -> AgentInvocation {
        let template = match step {
            PrepStep::Research => &self.research_command,
            PrepStep::Plan => &self.plan_command,
        };
        AgentInvocation::new(
            render_command(template, phase),
            self.max_turns,
            format!("phase-{}-{}", phase_prefix(phase), step),
        )
    }
}

/// Result of [`prepare_all`].
#[derive(Debug, Clone, Default)]
pub struct PrepareOutcome {
    /// One entry per phase that had steps to run
    pub results: BTreeMap<u32, ExecutionResult>,
    /// Already planned or complete; nothing was launched
    pub already_prepared: Vec<u32>,
    /// No phase directory on disk; nothing was launched
    pub missing: Vec<u32>,
}

/// Ephemeral state of one phase's chain, owned by the task that drives it.
struct PipelineRun {
    phase: u32,
    steps: Vec<PrepStep>,
    started: Instant,
}

impl PipelineRun {
    /// Run the steps in order; a step only starts if the previous one succeeded and the
    /// batch deadline has not passed.
    async fn drive(
        self,
        runner: Arc<dyn AgentRunner>,
        options: Arc<PrepareOptions>,
        deadline: Instant,
    ) -> ExecutionResult {
        let mut output = String::new();
        let mut exit_code = None;

        for step in &self.steps {
            if Instant::now() >= deadline {
                warn!(phase = self.phase, %step, "batch deadline passed before step started");
                return ExecutionResult::timed_out(self.started.elapsed(), output);
            }

            let invocation = options.invocation(self.phase, *step);
            let result = runner.attempt(&invocation, deadline).await;
            output.push_str(&result.captured_output);

            if !result.success {
                warn!(phase = self.phase, %step, timed_out = result.timed_out, "preparation step failed");
                return ExecutionResult {
                    duration: self.started.elapsed(),
                    captured_output: output,
                    ..result
                };
            }
            exit_code = result.exit_code;
        }

        ExecutionResult::exited(exit_code, self.started.elapsed(), output)
    }
}

/// Prepare every phase in `phases` that still needs research or planning.
///
/// Chains for different phases run concurrently with no ordering between them. Each
/// phase is classified once, up front.
pub async fn prepare_all(
    runner: Arc<dyn AgentRunner>,
    phases_dir: &Path,
    phases: &[u32],
    options: &PrepareOptions,
) -> PrepareOutcome {
    let mut outcome = PrepareOutcome::default();
    let mut runs = Vec::new();

    let mut phases = phases.to_vec();
    phases.sort_unstable();
    phases.dedup();

    for phase in phases {
        let state = classify_phase(phases_dir, phase);
        let steps = build_steps(&state, options.skip_research, options.skip_planning);
        if !steps.is_empty() {
            info!(phase, status = %state.status, steps = ?steps, "queued for preparation");
            runs.push(PipelineRun {
                phase,
                steps,
                started: Instant::now(),
            });
        } else if state.status == PhaseStatus::Unknown {
            warn!(phase, "no phase directory; cannot prepare");
            outcome.missing.push(phase);
        } else {
            outcome.already_prepared.push(phase);
        }
    }

    if runs.is_empty() {
        return outcome;
    }

    let deadline = deadline_after(options.timeout);
    let options = Arc::new(options.clone());
    info!(chains = runs.len(), timeout_secs = options.timeout.as_secs(), "starting preparation batch");

    let mut handles = Vec::with_capacity(runs.len());
    for mut run in runs {
        let phase = run.phase;
        run.started = Instant::now();
        let handle = tokio::spawn(run.drive(Arc::clone(&runner), Arc::clone(&options), deadline));
        handles.push((phase, handle));
    }

    let (phases, handles): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();
    for (phase, joined) in phases.into_iter().zip(join_all(handles).await) {
        let result = joined.unwrap_or_else(|e| {
            warn!(phase, error = %e, "preparation task aborted");
            ExecutionResult::failure(format!("preparation task aborted: {}", e), Duration::ZERO)
        });
        outcome.results.insert(phase, result);
    }

    outcome
}
