//! Typed error hierarchy for the autopilot orchestrator.
//!
//! Only `ProjectNotFound` is allowed to abort a run. Every other failure a phase or an
//! improvement iteration can hit is carried as data (`ExecutionResult`, `StopReason`);
//! the variants below cover the I/O seams that feed those values.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the orchestrator's filesystem and process seams.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("No project root found: no .planning/ROADMAP.md in {start} or any parent directory")]
    ProjectNotFound { start: PathBuf },

    #[error("Failed to spawn agent process '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open capture file at {path}: {source}")]
    CaptureFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read roadmap at {path}: {source}")]
    RoadmapReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write roadmap at {path}: {source}")]
    RoadmapWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
