//! Roadmap parsing and append-only updates.
//!
//! The roadmap is a markdown document whose phase entries are checkbox lines:
//!
//! ```text
//! - [ ] **Phase 3: auth-flow** — Login, logout and session refresh
//!   **Goal:** Users can sign in
//!   Plans:
//!   - [ ] 03-01-PLAN.md
//! ```
//!
//! Only the improvement loop writes to it, and only by appending whole entries.

use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use super::status::classify;
use crate::errors::OrchestratorError;
use crate::project::ProjectPaths;

static ENTRY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+\[([ xX])\]\s+\*\*Phase\s+(\d+)\s*:\s*(.+?)\*\*\s*(?:[-–—]+\s*(.*?))?\s*$")
        .unwrap()
});

/// One phase line from the roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoadmapEntry {
    pub number: u32,
    pub slug: String,
    pub description: String,
    /// Checkbox state as written by humans or the agent
    pub completed: bool,
}

/// A new entry to append, with its goal line and plan checklist.
#[derive(Debug, Clone)]
pub struct NewRoadmapEntry {
    pub number: u32,
    pub slug: String,
    pub description: String,
    pub goal: String,
    pub plans: Vec<String>,
}

impl NewRoadmapEntry {
    fn render(&self) -> String {
        let mut out = format!(
            "- [ ] **Phase {}: {}** — {}\n  **Goal:** {}\n",
            self.number, self.slug, self.description, self.goal
        );
        if !self.plans.is_empty() {
            out.push_str("  Plans:\n");
            for plan in &self.plans {
                out.push_str(&format!("  - [ ] {}\n", plan));
            }
        }
        out
    }
}

/// Parsed view of the roadmap document.
#[derive(Debug, Clone, Default)]
pub struct Roadmap {
    entries: Vec<RoadmapEntry>,
}

impl Roadmap {
    /// Parse roadmap text. Lines that are not phase entries are ignored.
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| {
                let caps = ENTRY_REGEX.captures(line)?;
                let number = caps.get(2)?.as_str().parse().ok()?;
                Some(RoadmapEntry {
                    number,
                    slug: caps.get(3)?.as_str().trim().to_string(),
                    description: caps
                        .get(4)
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default(),
                    completed: !caps.get(1)?.as_str().trim().is_empty(),
                })
            })
            .collect();

        Self { entries }
    }

    /// Load and parse the roadmap at `path`.
    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| OrchestratorError::RoadmapReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&content))
    }

    pub fn entries(&self) -> &[RoadmapEntry] {
        &self.entries
    }

    pub fn entry(&self, number: u32) -> Option<&RoadmapEntry> {
        self.entries.iter().find(|e| e.number == number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entry(number).is_some()
    }

    /// Phase numbers in ascending order, each exactly once.
    pub fn phase_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.entries.iter().map(|e| e.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    /// The next unused phase number: highest entry + 1, or 1 for an empty roadmap.
    pub fn next_phase_number(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.number)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Roadmap phases whose on-disk status is not yet complete, ascending.
    pub fn incomplete_phases(&self, paths: &ProjectPaths) -> Vec<u32> {
        self.phase_numbers()
            .into_iter()
            .filter(|n| !classify(&paths.phases_dir, *n).is_complete())
            .collect()
    }
}

/// Append `entry` to the roadmap file.
///
/// Returns `Ok(false)` without touching the file when an entry with the same number is
/// already present, so repeated synthesis never produces duplicates.
pub fn append_entry(path: &Path, entry: &NewRoadmapEntry) -> Result<bool, OrchestratorError> {
    let existing =
        std::fs::read_to_string(path).map_err(|source| OrchestratorError::RoadmapReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    if Roadmap::parse(&existing).contains(entry.number) {
        debug!(phase = entry.number, "roadmap entry already present, not appending");
        return Ok(false);
    }

    let mut text = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        text.push('\n');
    }
    text.push('\n');
    text.push_str(&entry.render());

    let write_err = |source| OrchestratorError::RoadmapWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(text.as_bytes()).map_err(write_err)?;

    debug!(phase = entry.number, slug = %entry.slug, "appended roadmap entry");
    Ok(true)
}
