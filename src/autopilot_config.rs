//! File-level configuration read from `.planning/autopilot.toml`.
//!
//! Layering is file → environment → CLI: this module owns the first two layers, and
//! [`crate::config::Config::resolve`] applies CLI overrides on top.
//!
//! # Configuration File Format
//!
//! ```toml
//! [agent]
//! command = "claude"
//! skip_permissions = true
//! max_turns = 50
//!
//! [timeouts]
//! prep_minutes = 30
//! execute_minutes = 60
//! review_minutes = 30
//! poll_interval_secs = 5
//!
//! [commands]
//! research = "/gsd:research-phase {phase}"
//! plan = "/gsd:plan-phase {phase}"
//! execute = "/gsd:execute-phase {phase}"
//! review = "/gsd:review"
//!
//! [review]
//! report_file = ".planning/reviews/REVIEW.md"
//! findings_file = ".planning/reviews/FINDINGS.md"
//! settle_delay_secs = 2
//! target_score = 90
//! max_iterations = 3
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::project::ProjectPaths;

/// Environment variable overriding `[agent] command`.
pub const AGENT_CMD_ENV: &str = "AUTOPILOT_AGENT_CMD";
/// Environment variable overriding `[agent] skip_permissions` (`false` disables).
pub const SKIP_PERMISSIONS_ENV: &str = "AUTOPILOT_SKIP_PERMISSIONS";

/// External agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Agent CLI command (default: "claude")
    #[serde(default)]
    pub command: Option<String>,
    /// Pass the permission-skipping flag to every invocation
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
    /// Conversation turn cap per invocation
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

fn default_skip_permissions() -> bool {
    true
}

fn default_max_turns() -> u32 {
    50
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            command: None,
            skip_permissions: default_skip_permissions(),
            max_turns: default_max_turns(),
        }
    }
}

/// Timeout budgets, in minutes unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsSection {
    /// Shared deadline for the whole parallel preparation batch
    #[serde(default = "default_prep_minutes")]
    pub prep_minutes: u64,
    /// Per-phase execution budget
    #[serde(default = "default_execute_minutes")]
    pub execute_minutes: u64,
    /// Budget for one review invocation
    #[serde(default = "default_review_minutes")]
    pub review_minutes: u64,
    /// Watchdog liveness poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_prep_minutes() -> u64 {
    30
}

fn default_execute_minutes() -> u64 {
    60
}

fn default_review_minutes() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            prep_minutes: default_prep_minutes(),
            execute_minutes: default_execute_minutes(),
            review_minutes: default_review_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Command templates handed to the agent. `{phase}` is replaced by the phase number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsSection {
    #[serde(default = "default_research_command")]
    pub research: String,
    #[serde(default = "default_plan_command")]
    pub plan: String,
    #[serde(default = "default_execute_command")]
    pub execute: String,
    #[serde(default = "default_review_command")]
    pub review: String,
}

fn default_research_command() -> String {
    "/gsd:research-phase {phase}".to_string()
}

fn default_plan_command() -> String {
    "/gsd:plan-phase {phase}".to_string()
}

fn default_execute_command() -> String {
    "/gsd:execute-phase {phase}".to_string()
}

fn default_review_command() -> String {
    "/gsd:review".to_string()
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            research: default_research_command(),
            plan: default_plan_command(),
            execute: default_execute_command(),
            review: default_review_command(),
        }
    }
}

/// Review and improvement-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSection {
    /// Review report read when the captured output has no health line
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
    /// Numbered findings list used to synthesize remediation phases
    #[serde(default = "default_findings_file")]
    pub findings_file: PathBuf,
    /// Pause after a review finishes before reading its files
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_target_score")]
    pub target_score: u8,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_report_file() -> PathBuf {
    PathBuf::from(".planning/reviews/REVIEW.md")
}

fn default_findings_file() -> PathBuf {
    PathBuf::from(".planning/reviews/FINDINGS.md")
}

fn default_settle_delay_secs() -> u64 {
    2
}

fn default_target_score() -> u8 {
    90
}

fn default_max_iterations() -> u32 {
    3
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            report_file: default_report_file(),
            findings_file: default_findings_file(),
            settle_delay_secs: default_settle_delay_secs(),
            target_score: default_target_score(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// The complete autopilot.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutopilotToml {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub commands: CommandsSection,
    #[serde(default)]
    pub review: ReviewSection,
}

impl AutopilotToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse autopilot.toml")
    }

    /// Load from the project's config path, or defaults when the file is absent.
    pub fn load_or_default(paths: &ProjectPaths) -> Result<Self> {
        if paths.config_file.exists() {
            Self::load(&paths.config_file)
        } else {
            Ok(Self::default())
        }
    }

    /// Agent command: environment overrides the file, default "claude".
    pub fn agent_cmd(&self) -> String {
        std::env::var(AGENT_CMD_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.agent.command.clone())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Permission skipping: environment overrides the file.
    pub fn skip_permissions(&self) -> bool {
        if let Ok(env_val) = std::env::var(SKIP_PERMISSIONS_ENV) {
            return env_val != "false";
        }
        self.agent.skip_permissions
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.review.target_score > 100 {
            warnings.push(format!(
                "target_score {} is above 100 and can never be reached",
                self.review.target_score
            ));
        }
        if self.review.max_iterations == 0 {
            warnings.push("max_iterations is 0: the improvement loop will not review".to_string());
        }
        if self.timeouts.poll_interval_secs == 0 {
            warnings.push("poll_interval_secs is 0; using 1 second".to_string());
        } else if self.timeouts.poll_interval_secs > 3600 {
            warnings.push(format!(
                "poll_interval_secs {} is above 3600; using 3600",
                self.timeouts.poll_interval_secs
            ));
        }
        for (name, minutes) in [
            ("prep_minutes", self.timeouts.prep_minutes),
            ("execute_minutes", self.timeouts.execute_minutes),
            ("review_minutes", self.timeouts.review_minutes),
        ] {
            if minutes == 0 {
                warnings.push(format!("{} is 0: every invocation will time out", name));
            }
        }
        for (name, template) in [
            ("research", &self.commands.research),
            ("plan", &self.commands.plan),
            ("execute", &self.commands.execute),
        ] {
            if !template.contains("{phase}") {
                warnings.push(format!(
                    "commands.{} has no {{phase}} placeholder: '{}'",
                    name, template
                ));
            }
        }

        warnings
    }
}

/// Substitute the phase number into a command template.
pub fn render_command(template: &str, phase: u32) -> String {
    template.replace("{phase}", &phase.to_string())
}
