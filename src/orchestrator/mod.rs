//! Top-level run: select phases, prepare them in parallel, execute them in order, then
//! optionally hand over to the improvement loop.

pub mod execute;
pub mod prepare;

pub use execute::{ExecuteOptions, ExecuteOutcome, execute_all};
pub use prepare::{PrepareOptions, PrepareOutcome, prepare_all};

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::agent::AgentRunner;
use crate::config::Config;
use crate::errors::OrchestratorError;
use crate::improve::{ImprovementConfig, run_improvement};
use crate::phase::{PhaseStatus, PrepStep, Roadmap, build_steps, classify_phase};
use crate::project::ProjectPaths;
use crate::report::{RunOptions, RunReport, RunStats};

/// Roadmap phases within `[start, end]`.
///
/// `start == 0` means the first roadmap phase that is not complete on disk;
/// `end == 0` means the last roadmap phase. When every phase is complete and `start` is
/// automatic, nothing is selected.
pub fn select_phases(
    paths: &ProjectPaths,
    start: u32,
    end: u32,
) -> Result<Vec<u32>, OrchestratorError> {
    let roadmap = Roadmap::load(&paths.roadmap)?;
    let numbers = roadmap.phase_numbers();

    let start = if start == 0 {
        match roadmap.incomplete_phases(paths).first() {
            Some(first) => *first,
            None => return Ok(Vec::new()),
        }
    } else {
        start
    };
    let end = if end == 0 {
        numbers.last().copied().unwrap_or(0)
    } else {
        end
    };

    Ok(numbers
        .into_iter()
        .filter(|n| *n >= start && *n <= end)
        .collect())
}

/// What a run would do for one phase; printed by `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhasePlan {
    pub number: u32,
    pub status: PhaseStatus,
    pub steps: Vec<PrepStep>,
    pub will_execute: bool,
}

/// Describe the run without touching anything.
pub fn plan_run(paths: &ProjectPaths, phases: &[u32], config: &Config) -> Vec<PhasePlan> {
    phases
        .iter()
        .map(|&number| {
            let state = classify_phase(&paths.phases_dir, number);
            let steps = build_steps(&state, config.skip_research, config.skip_planning);
            let will_execute = !config.prepare_only
                && (state.status == PhaseStatus::Planned || steps.contains(&PrepStep::Plan));
            PhasePlan {
                number,
                status: state.status,
                steps,
                will_execute,
            }
        })
        .collect()
}

/// Run preparation, execution and (if enabled) the improvement loop over `phases`.
///
/// Never fails: every phase or iteration failure ends up in the returned report.
pub async fn run(config: &Config, runner: Arc<dyn AgentRunner>, phases: Vec<u32>) -> RunReport {
    let paths = &config.paths;
    let mut report = RunReport::new(
        &paths.root,
        RunOptions {
            phases: phases.clone(),
            skip_research: config.skip_research,
            skip_planning: config.skip_planning,
            prepare_only: config.prepare_only,
            continuous_improvement: config.continuous_improvement,
            target_score: config.target_score,
            max_iterations: config.max_iterations,
        },
    );
    let settings = ImprovementConfig::from_config(config);
    let mut stats = RunStats::default();

    if !phases.is_empty() {
        info!(phases = ?phases, "preparing phases");
        let prepared = prepare_all(
            Arc::clone(&runner),
            &paths.phases_dir,
            &phases,
            &settings.prepare_options(),
        )
        .await;
        stats = stats.record_prepare(&prepared);

        if !config.prepare_only {
            info!(phases = ?phases, "executing phases");
            let executed = execute_all(
                runner.as_ref(),
                &paths.phases_dir,
                &phases,
                &settings.execute_options(),
            )
            .await;
            stats = stats.record_execute(&executed);
        }
    } else {
        info!("no phases selected");
    }

    let improvement = if config.continuous_improvement && !config.prepare_only {
        let (outcome, updated) = run_improvement(runner, paths, &settings, stats).await;
        stats = updated;
        Some(outcome)
    } else {
        None
    };

    report.finish(stats, improvement);
    report
}
