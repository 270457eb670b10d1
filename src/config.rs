use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::autopilot_config::{AutopilotToml, CommandsSection};
use crate::project::ProjectPaths;

/// Values taken from the command line. `None` falls through to the file and its defaults.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub start_phase: u32,
    pub end_phase: u32,
    pub max_turns: Option<u32>,
    pub prep_timeout_minutes: Option<u64>,
    pub execute_timeout_minutes: Option<u64>,
    pub review_timeout_minutes: Option<u64>,
    pub skip_research: bool,
    pub skip_planning: bool,
    pub prepare_only: bool,
    pub dry_run: bool,
    pub continuous_improvement: bool,
    pub target_score: Option<u8>,
    pub max_iterations: Option<u32>,
    pub stop_on_no_improvement: bool,
    pub verbose: bool,
    pub no_progress: bool,
}

/// Runtime configuration for one autopilot run.
///
/// Bridges `autopilot.toml`, the environment and CLI flags into the concrete values the
/// schedulers and the improvement loop consume.
#[derive(Debug, Clone)]
pub struct Config {
    pub paths: ProjectPaths,
    pub agent_cmd: String,
    pub skip_permissions: bool,
    pub max_turns: u32,
    pub prep_timeout: Duration,
    pub execute_timeout: Duration,
    pub review_timeout: Duration,
    pub poll_interval: Duration,
    pub commands: CommandsSection,
    pub review_report: PathBuf,
    pub findings_file: PathBuf,
    pub settle_delay: Duration,
    /// 0 = first incomplete roadmap phase
    pub start_phase: u32,
    /// 0 = last roadmap phase
    pub end_phase: u32,
    pub skip_research: bool,
    pub skip_planning: bool,
    pub prepare_only: bool,
    pub dry_run: bool,
    pub continuous_improvement: bool,
    pub target_score: u8,
    pub max_iterations: u32,
    pub stop_on_no_improvement: bool,
    pub verbose: bool,
    pub show_progress: bool,
}

/// Longest gap between watchdog liveness checks.
const MAX_POLL_SECS: u64 = 3600;

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

impl Config {
    /// Load `autopilot.toml` (if any) for `paths` and layer `cli` on top.
    ///
    /// Never fatal: an unreadable or malformed file is logged and replaced by defaults,
    /// and validation warnings are logged.
    pub fn load(paths: ProjectPaths, cli: CliOverrides) -> Self {
        let file = match AutopilotToml::load_or_default(&paths) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    config = %paths.config_file.display(),
                    "{:#}; falling back to defaults",
                    e
                );
                AutopilotToml::default()
            }
        };
        for warning in file.validate() {
            warn!(config = %paths.config_file.display(), "{}", warning);
        }
        Self::resolve(paths, &file, cli)
    }

    /// Combine file/env settings with CLI overrides.
    pub fn resolve(paths: ProjectPaths, file: &AutopilotToml, cli: CliOverrides) -> Self {
        let review_report = paths.resolve(&file.review.report_file);
        let findings_file = paths.resolve(&file.review.findings_file);

        Self {
            agent_cmd: file.agent_cmd(),
            skip_permissions: file.skip_permissions(),
            max_turns: cli.max_turns.unwrap_or(file.agent.max_turns),
            prep_timeout: minutes(cli.prep_timeout_minutes.unwrap_or(file.timeouts.prep_minutes)),
            execute_timeout: minutes(
                cli.execute_timeout_minutes
                    .unwrap_or(file.timeouts.execute_minutes),
            ),
            review_timeout: minutes(
                cli.review_timeout_minutes
                    .unwrap_or(file.timeouts.review_minutes),
            ),
            poll_interval: Duration::from_secs(
                file.timeouts.poll_interval_secs.clamp(1, MAX_POLL_SECS),
            ),
            commands: file.commands.clone(),
            review_report,
            findings_file,
            settle_delay: Duration::from_secs(file.review.settle_delay_secs),
            start_phase: cli.start_phase,
            end_phase: cli.end_phase,
            skip_research: cli.skip_research,
            skip_planning: cli.skip_planning,
            prepare_only: cli.prepare_only,
            dry_run: cli.dry_run,
            continuous_improvement: cli.continuous_improvement,
            target_score: cli.target_score.unwrap_or(file.review.target_score),
            max_iterations: cli.max_iterations.unwrap_or(file.review.max_iterations),
            stop_on_no_improvement: cli.stop_on_no_improvement,
            verbose: cli.verbose,
            show_progress: !cli.no_progress,
            paths,
        }
    }

    /// Flags appended to every agent invocation after the command and turn cap.
    pub fn agent_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags
    }
}
