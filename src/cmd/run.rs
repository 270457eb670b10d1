//! A full run: prepare, execute and optionally improve the selected phases.

use console::style;
use std::sync::Arc;
use tracing::{info, warn};

use autopilot::agent::Watchdog;
use autopilot::config::{CliOverrides, Config};
use autopilot::logging;
use autopilot::orchestrator::{self, select_phases};
use autopilot::project::ProjectPaths;
use autopilot::ui::AgentProgress;
use autopilot::ui::icons::{RUNNING, SKIP};

/// Failures past locating the project are logged and reported, never fatal.
pub async fn run_autopilot(paths: ProjectPaths, overrides: CliOverrides) {
    let state_dirs = paths.ensure_state_dirs();
    let log_dir = state_dirs.is_ok().then_some(paths.log_dir.as_path());
    let _log_guard = logging::init(overrides.verbose, log_dir);
    if let Err(e) = &state_dirs {
        warn!("{:#}; logging to stderr only", e);
    }

    let config = Config::load(paths, overrides);
    let phases = match select_phases(&config.paths, config.start_phase, config.end_phase) {
        Ok(phases) => phases,
        Err(e) => {
            warn!(error = %e, "could not select phases");
            Vec::new()
        }
    };

    println!(
        "{}{} {}",
        RUNNING,
        style("Autopilot").bold(),
        style(config.paths.root.display()).dim()
    );
    if phases.is_empty() {
        println!("{}No incomplete phases in range", SKIP);
    } else {
        println!("  Phases: {:?}", phases);
    }
    info!(
        agent = %config.agent_cmd,
        start = config.start_phase,
        end = config.end_phase,
        "starting run"
    );

    let progress = Arc::new(AgentProgress::new(config.show_progress, config.verbose));
    let runner = Arc::new(Watchdog::from_config(&config, progress));

    let report = orchestrator::run(&config, runner, phases).await;
    println!("{}", report.render());

    match report.save(&config.paths.runs_dir) {
        Ok(path) => println!("Report: {}", style(path.display()).dim()),
        Err(e) => warn!(error = %e, "failed to save run report"),
    }
}
