//! `--dry-run`: describe what a run would do.

use console::style;
use tracing::warn;

use autopilot::config::{CliOverrides, Config};
use autopilot::logging;
use autopilot::orchestrator::{plan_run, select_phases};
use autopilot::project::ProjectPaths;

/// Print each target phase's status, pending steps and whether it would execute.
/// Spawns nothing and writes nothing.
pub fn cmd_dry_run(paths: ProjectPaths, overrides: CliOverrides) {
    let _log_guard = logging::init(overrides.verbose, None);

    let config = Config::load(paths, overrides);
    let phases = match select_phases(&config.paths, config.start_phase, config.end_phase) {
        Ok(phases) => phases,
        Err(e) => {
            warn!(error = %e, "could not select phases");
            Vec::new()
        }
    };

    println!();
    println!("Dry run: {}", config.paths.root.display());
    println!("===================");
    println!();

    if phases.is_empty() {
        println!("No incomplete phases in range.");
        return;
    }

    for plan in plan_run(&config.paths, &phases, &config) {
        let steps = if plan.steps.is_empty() {
            "none".to_string()
        } else {
            plan.steps
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let execute = if plan.will_execute {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!(
            "  Phase {:<3} {:<11} prepare: {:<15} execute: {}",
            plan.number,
            plan.status.to_string(),
            steps,
            execute
        );
    }

    if config.continuous_improvement && !config.prepare_only {
        println!();
        println!(
            "Then: review until score >= {} (at most {} iterations)",
            config.target_score, config.max_iterations
        );
    }
    println!();
}
