//! Phase state classification from on-disk artifacts.
//!
//! Status is never stored: every call re-reads the phase directory, so the answer only
//! changes when the external agent has written files in between.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Filename suffix of a plan artifact.
pub const PLAN_SUFFIX: &str = "-PLAN.md";
/// Filename suffix of a summary artifact (one per completed plan).
pub const SUMMARY_SUFFIX: &str = "-SUMMARY.md";
/// Filename suffix of a research artifact.
pub const RESEARCH_SUFFIX: &str = "RESEARCH.md";

/// Derived status of a phase.
///
/// Variants are declared in progression order; a phase only ever moves forward
/// through them during a run because the orchestrator never deletes artifacts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    /// No phase directory exists
    #[default]
    Unknown,
    /// Directory exists, no research and no plans
    Pending,
    /// Research artifact present, no plans yet
    Researched,
    /// At least one plan, fewer summaries than plans
    Planned,
    /// Every plan has a summary
    Complete,
}

impl PhaseStatus {
    /// Whether the execute step may run for a phase in this status.
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Planned | Self::Complete)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Researched => "researched",
            Self::Planned => "planned",
            Self::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of one phase's artifacts at the moment of classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    pub number: u32,
    pub dir: Option<PathBuf>,
    pub status: PhaseStatus,
    pub plan_count: usize,
    pub summary_count: usize,
    pub has_research: bool,
}

/// Directory-name prefix for a phase number (`3` -> `03`, `112` -> `112`).
pub fn phase_prefix(number: u32) -> String {
    format!("{:02}", number)
}

/// Locate the directory for `number` under `phases_dir`.
///
/// Matches `NN` exactly or `NN-<slug>`; the lexically first match wins.
pub fn find_phase_dir(phases_dir: &Path, number: u32) -> Option<PathBuf> {
    let prefix = phase_prefix(number);
    let dashed = format!("{}-", prefix);

    let mut matches: Vec<PathBuf> = std::fs::read_dir(phases_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name == prefix.as_str() || name.starts_with(&dashed)
        })
        .map(|entry| entry.path())
        .collect();

    matches.sort();
    matches.into_iter().next()
}

/// Count regular files in `dir` whose name ends with `suffix`.
pub fn count_artifacts(dir: &Path, suffix: &str) -> usize {
    let pattern = format!(
        "{}/*{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(suffix)
    );

    match glob::glob(&pattern) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .count(),
        Err(_) => 0,
    }
}

/// Classify a phase, returning the full artifact snapshot.
pub fn classify_phase(phases_dir: &Path, number: u32) -> PhaseState {
    let Some(dir) = find_phase_dir(phases_dir, number) else {
        return PhaseState {
            number,
            dir: None,
            status: PhaseStatus::Unknown,
            plan_count: 0,
            summary_count: 0,
            has_research: false,
        };
    };

    let plan_count = count_artifacts(&dir, PLAN_SUFFIX);
    let summary_count = count_artifacts(&dir, SUMMARY_SUFFIX);
    let has_research = count_artifacts(&dir, RESEARCH_SUFFIX) > 0;

    let status = if plan_count == 0 {
        if has_research {
            PhaseStatus::Researched
        } else {
            PhaseStatus::Pending
        }
    } else if summary_count >= plan_count {
        PhaseStatus::Complete
    } else {
        PhaseStatus::Planned
    };

    PhaseState {
        number,
        dir: Some(dir),
        status,
        plan_count,
        summary_count,
        has_research,
    }
}

/// Classify a phase, returning only its status.
pub fn classify(phases_dir: &Path, number: u32) -> PhaseStatus {
    classify_phase(phases_dir, number).status
}
