//! Project location and the on-disk layout the orchestrator reads and writes.
//!
//! ```text
//! <root>/
//! └── .planning/
//!     ├── ROADMAP.md           # marker file + phase list
//!     ├── autopilot.toml       # optional configuration
//!     ├── phases/
//!     │   └── 03-auth/         # one directory per phase
//!     ├── reviews/             # review report + findings written by the agent
//!     └── autopilot/
//!         ├── logs/            # per-invocation capture sinks, tracing log
//!         └── runs/            # JSON run reports
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::errors::OrchestratorError;

/// Directory holding every planning artifact.
pub const PLANNING_DIR: &str = ".planning";

/// File whose presence marks a project root.
pub const ROADMAP_FILE: &str = "ROADMAP.md";

/// Walk `start` and its ancestors until one contains `.planning/ROADMAP.md`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, OrchestratorError> {
    let start = start
        .canonicalize()
        .unwrap_or_else(|_| start.to_path_buf());

    start
        .ancestors()
        .find(|dir| dir.join(PLANNING_DIR).join(ROADMAP_FILE).is_file())
        .map(Path::to_path_buf)
        .ok_or(OrchestratorError::ProjectNotFound { start })
}

/// Resolved paths for one project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub planning_dir: PathBuf,
    pub roadmap: PathBuf,
    pub phases_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub runs_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let planning_dir = root.join(PLANNING_DIR);
        let state_dir = planning_dir.join("autopilot");
        Self {
            roadmap: planning_dir.join(ROADMAP_FILE),
            phases_dir: planning_dir.join("phases"),
            config_file: planning_dir.join("autopilot.toml"),
            log_dir: state_dir.join("logs"),
            runs_dir: state_dir.join("runs"),
            state_dir,
            planning_dir,
            root,
        }
    }

    /// Resolve a project-relative path (absolute paths pass through).
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Create the orchestrator's own state directories.
    pub fn ensure_state_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", self.log_dir.display()))?;
        std::fs::create_dir_all(&self.runs_dir).with_context(|| {
            format!("Failed to create runs directory: {}", self.runs_dir.display())
        })?;
        Ok(())
    }
}
