//! Run statistics and the end-of-run report.
//!
//! [`RunStats`] is a plain accumulator: every stage takes it by value and hands back an
//! updated copy, so there is no shared mutable counter anywhere in a run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::improve::ImprovementOutcome;
use crate::orchestrator::{ExecuteOutcome, PrepareOutcome};
use crate::ui::icons::{CHECK, CROSS, PROGRESS, REVIEW};

/// Stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prepare,
    Execute,
}

/// A recorded failure. Failures are never dropped from the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub phase: u32,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub prepared: u32,
    pub prep_failures: u32,
    pub prep_timeouts: u32,
    pub already_prepared: u32,
    pub executed: u32,
    pub execution_failures: u32,
    pub execution_timeouts: u32,
    pub skipped_complete: u32,
    pub skipped_unplanned: u32,
    pub failures: Vec<StageFailure>,
}

impl RunStats {
    pub fn record_prepare(mut self, outcome: &PrepareOutcome) -> Self {
        self.already_prepared += outcome.already_prepared.len() as u32;

        for phase in &outcome.missing {
            self.prep_failures += 1;
            self.failures.push(StageFailure {
                phase: *phase,
                stage: Stage::Prepare,
                reason: "no phase directory".to_string(),
            });
        }

        for (phase, result) in &outcome.results {
            if result.success {
                self.prepared += 1;
                continue;
            }
            if result.timed_out {
                self.prep_timeouts += 1;
            } else {
                self.prep_failures += 1;
            }
            self.failures.push(StageFailure {
                phase: *phase,
                stage: Stage::Prepare,
                reason: result.failure_reason(),
            });
        }
        self
    }

    pub fn record_execute(mut self, outcome: &ExecuteOutcome) -> Self {
        self.skipped_complete += outcome.skipped_complete.len() as u32;

        for (phase, result) in &outcome.results {
            if outcome.skipped_unplanned.contains(phase) {
                self.skipped_unplanned += 1;
            } else if result.success {
                self.executed += 1;
                continue;
            } else if result.timed_out {
                self.execution_timeouts += 1;
            } else {
                self.execution_failures += 1;
            }
            self.failures.push(StageFailure {
                phase: *phase,
                stage: Stage::Execute,
                reason: result.failure_reason(),
            });
        }
        self
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Options echoed into the report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOptions {
    pub phases: Vec<u32>,
    pub skip_research: bool,
    pub skip_planning: bool,
    pub prepare_only: bool,
    pub continuous_improvement: bool,
    pub target_score: u8,
    pub max_iterations: u32,
}

/// Everything one invocation did, saved as JSON under the runs directory.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub project_root: PathBuf,
    pub options: RunOptions,
    pub stats: RunStats,
    pub improvement: Option<ImprovementOutcome>,
}

impl RunReport {
    pub fn new(project_root: &Path, options: RunOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            project_root: project_root.to_path_buf(),
            options,
            stats: RunStats::default(),
            improvement: None,
        }
    }

    pub fn finish(&mut self, stats: RunStats, improvement: Option<ImprovementOutcome>) {
        self.stats = stats;
        self.improvement = improvement;
        self.finished_at = Some(Utc::now());
    }

    /// Write the report to `<runs_dir>/<timestamp>_<id8>.json`.
    pub fn save(&self, runs_dir: &Path) -> Result<PathBuf> {
        let filename = format!(
            "{}_{}.json",
            self.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &self.run_id.to_string()[..8]
        );
        let path = runs_dir.join(filename);

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;
        Ok(path)
    }

    /// Human-readable summary for the terminal.
    pub fn render(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();

        let _ = writeln!(out, "\n{}{}", PROGRESS, style("Run summary").bold());
        if let Some(finished) = self.finished_at {
            let secs = (finished - self.started_at).num_seconds().max(0);
            let _ = writeln!(out, "  Duration:       {}m {}s", secs / 60, secs % 60);
        }
        let _ = writeln!(out, "  Phases:         {:?}", self.options.phases);
        let _ = writeln!(
            out,
            "  Prepared:       {} ok, {} failed, {} timed out, {} already prepared",
            s.prepared, s.prep_failures, s.prep_timeouts, s.already_prepared
        );
        if !self.options.prepare_only {
            let _ = writeln!(
                out,
                "  Executed:       {} ok, {} failed, {} timed out, {} complete, {} unplanned",
                s.executed,
                s.execution_failures,
                s.execution_timeouts,
                s.skipped_complete,
                s.skipped_unplanned
            );
        }

        if let Some(imp) = &self.improvement {
            let _ = writeln!(out, "\n{}{}", REVIEW, style("Continuous improvement").bold());
            for record in &imp.history {
                let score = record
                    .health
                    .as_ref()
                    .map(|h| format!("{}/100 ({}), {} blockers", h.score, h.grade, h.blockers))
                    .unwrap_or_else(|| "no score".to_string());
                let _ = writeln!(
                    out,
                    "  Iteration {}:    {}; created {:?}, executed {:?}",
                    record.iteration, score, record.phases_created, record.phases_executed
                );
                if let Some(err) = &record.synthesis_error {
                    let _ = writeln!(
                        out,
                        "                  {}",
                        style(format!("synthesis stopped early: {}", err)).yellow()
                    );
                }
            }
            if let (Some(first), Some(last)) = (&imp.initial_health, &imp.final_health) {
                let _ = writeln!(out, "  Score:          {} -> {}", first.score, last.score);
            }
            let verdict = if imp.stop_reason.is_success() {
                format!("{}{}", CHECK, style(imp.stop_reason.to_string()).green())
            } else {
                format!("{}", style(imp.stop_reason.to_string()).yellow())
            };
            let _ = writeln!(out, "  Stopped:        {}", verdict);
        }

        if s.has_failures() {
            let _ = writeln!(out, "\n{}{}", CROSS, style("Failures").red().bold());
            for f in &s.failures {
                let stage = match f.stage {
                    Stage::Prepare => "prepare",
                    Stage::Execute => "execute",
                };
                let _ = writeln!(out, "  Phase {} ({}): {}", f.phase, stage, f.reason);
            }
        }

        out
    }
}
