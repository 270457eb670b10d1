//! Sequential execution: one phase at a time, ascending.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::{AgentInvocation, AgentRunner, ExecutionResult, deadline_after};
use crate::autopilot_config::render_command;
use crate::phase::{classify_phase, phase_prefix};

/// Settings for the execution pass.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Template with a `{phase}` placeholder
    pub execute_command: String,
    pub max_turns: u32,
    /// Budget for each phase individually
    pub timeout: Duration,
}

/// Result of [`execute_all`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOutcome {
    /// One entry per phase that was attempted or could not be (no plans)
    pub results: BTreeMap<u32, ExecutionResult>,
    pub skipped_complete: Vec<u32>,
    /// Also present in `results` as failures
    pub skipped_unplanned: Vec<u32>,
}

impl ExecuteOutcome {
    /// Phases whose execute step ran and succeeded.
    pub fn executed(&self) -> Vec<u32> {
        self.results
            .iter()
            .filter(|(phase, r)| r.success && !self.skipped_unplanned.contains(*phase))
            .map(|(phase, _)| *phase)
            .collect()
    }
}

/// Execute `phases` in ascending order, never concurrently.
///
/// Status is re-read right before each phase, since an earlier phase's execution may
/// have changed the tree. A failure never stops the loop.
pub async fn execute_all(
    runner: &dyn AgentRunner,
    phases_dir: &Path,
    phases: &[u32],
    options: &ExecuteOptions,
) -> ExecuteOutcome {
    let mut outcome = ExecuteOutcome::default();

    let mut phases = phases.to_vec();
    phases.sort_unstable();
    phases.dedup();

    for phase in phases {
        let state = classify_phase(phases_dir, phase);
        let status = state.status;
        if status.is_complete() {
            info!(phase, "already complete, skipping");
            outcome.skipped_complete.push(phase);
        } else if status.is_executable() {
            info!(phase, plans = state.plan_count, summaries = state.summary_count, "executing phase");
            let invocation = AgentInvocation::new(
                render_command(&options.execute_command, phase),
                options.max_turns,
                format!("phase-{}-execute", phase_prefix(phase)),
            );
            let result = runner
                .attempt(&invocation, deadline_after(options.timeout))
                .await;
            if !result.success {
                warn!(phase, timed_out = result.timed_out, exit_code = ?result.exit_code, "phase execution failed");
            }
            outcome.results.insert(phase, result);
        } else {
            warn!(phase, %status, "no plans to execute, skipping");
            outcome.skipped_unplanned.push(phase);
            outcome.results.insert(
                phase,
                ExecutionResult::failure(
                    format!("no plans to execute (status: {})", status),
                    Duration::ZERO,
                ),
            );
        }
    }

    outcome
}
