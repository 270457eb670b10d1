//! Continuous improvement: review → parse → decide → remediate → prepare/execute → repeat.
//!
//! The loop is single-flight: at most one agent process runs at a time outside the
//! preparation batch, and the roadmap is only written between reviews.

mod controller;

pub use controller::run_improvement;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::autopilot_config::CommandsSection;
use crate::config::Config;
use crate::orchestrator::{ExecuteOptions, PrepareOptions};
use crate::review::HealthSnapshot;

/// Loop settings.
#[derive(Debug, Clone)]
pub struct ImprovementConfig {
    pub target_score: u8,
    pub max_iterations: u32,
    pub review_timeout: Duration,
    pub prep_timeout: Duration,
    pub execute_timeout: Duration,
    pub max_turns: u32,
    pub stop_on_no_improvement: bool,
    pub skip_research: bool,
    pub skip_planning: bool,
    /// Pause between a review finishing and reading its files
    pub settle_delay: Duration,
    pub commands: CommandsSection,
    /// Read when the captured review output has no score; project-relative or absolute
    pub report_file: PathBuf,
    /// Project-relative or absolute
    pub findings_file: PathBuf,
}

impl ImprovementConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_score: config.target_score,
            max_iterations: config.max_iterations,
            review_timeout: config.review_timeout,
            prep_timeout: config.prep_timeout,
            execute_timeout: config.execute_timeout,
            max_turns: config.max_turns,
            stop_on_no_improvement: config.stop_on_no_improvement,
            skip_research: config.skip_research,
            skip_planning: config.skip_planning,
            settle_delay: config.settle_delay,
            commands: config.commands.clone(),
            report_file: config.review_report.clone(),
            findings_file: config.findings_file.clone(),
        }
    }

    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            research_command: self.commands.research.clone(),
            plan_command: self.commands.plan.clone(),
            max_turns: self.max_turns,
            skip_research: self.skip_research,
            skip_planning: self.skip_planning,
            timeout: self.prep_timeout,
        }
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            execute_command: self.commands.execute.clone(),
            max_turns: self.max_turns,
            timeout: self.execute_timeout,
        }
    }
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            target_score: 90,
            max_iterations: 3,
            review_timeout: Duration::from_secs(30 * 60),
            prep_timeout: Duration::from_secs(30 * 60),
            execute_timeout: Duration::from_secs(60 * 60),
            max_turns: 50,
            stop_on_no_improvement: false,
            skip_research: false,
            skip_planning: false,
            settle_delay: Duration::from_secs(2),
            commands: CommandsSection::default(),
            report_file: PathBuf::from(".planning/reviews/REVIEW.md"),
            findings_file: PathBuf::from(".planning/reviews/FINDINGS.md"),
        }
    }
}

/// Why the loop ended. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    ReviewTimeout,
    ReviewFailed { exit_code: Option<i32> },
    UnparsableScore,
    MissingFindings,
    NoCriticalFindings,
    NoNewPhases,
    SynthesisFailed { reason: String },
    Stagnation { previous: u8, current: u8 },
    MaxIterations,
}

impl StopReason {
    /// Whether the loop ended because the codebase met the target.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::TargetReached)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target score reached with no blockers"),
            Self::ReviewTimeout => write!(f, "review timed out"),
            Self::ReviewFailed {
                exit_code: Some(code),
            } => write!(f, "review failed (exit code {})", code),
            Self::ReviewFailed { exit_code: None } => write!(f, "review failed"),
            Self::UnparsableScore => write!(f, "could not parse a health score from the review"),
            Self::MissingFindings => write!(f, "findings document not found"),
            Self::NoCriticalFindings => write!(f, "no BLOCKER or HIGH findings to remediate"),
            Self::NoNewPhases => write!(f, "no new phases created"),
            Self::SynthesisFailed { reason } => {
                write!(f, "remediation synthesis failed: {}", reason)
            }
            Self::Stagnation { previous, current } => {
                write!(f, "no improvement (score {} after {})", current, previous)
            }
            Self::MaxIterations => write!(f, "maximum iterations reached"),
        }
    }
}

/// One completed iteration; appended once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 1-based
    pub iteration: u32,
    pub health: Option<HealthSnapshot>,
    pub phases_created: Vec<u32>,
    pub phases_executed: Vec<u32>,
    /// Synthesis stopped early; `phases_created` holds what it made before failing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_error: Option<String>,
    /// Set on the iteration that ended the loop
    pub stop_reason: Option<StopReason>,
}

impl IterationRecord {
    pub fn score(&self) -> Option<u8> {
        self.health.as_ref().map(|h| h.score)
    }
}

/// Final state of the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementOutcome {
    pub history: Vec<IterationRecord>,
    pub stop_reason: StopReason,
    pub initial_health: Option<HealthSnapshot>,
    pub final_health: Option<HealthSnapshot>,
}
