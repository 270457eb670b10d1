//! Critical findings extraction from the review's findings document.
//!
//! Only numbered list items carrying a `[BLOCKER]` or `[HIGH]` tag are of interest:
//!
//! ```text
//! 1. [BLOCKER] **SQL built from user input** in `src/db.rs`
//! 2. **[HIGH]** **Session tokens never expire**
//! ```

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use super::health::Severity;

static NUMBERED_ITEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").unwrap());

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*(BLOCKER|HIGH)\s*\]").unwrap());

static BOLD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

/// One critical finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    /// 1-based line in the findings document
    pub line: usize,
}

/// Critical findings grouped by tier, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Findings {
    pub blockers: Vec<Finding>,
    pub high: Vec<Finding>,
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        self.blockers.is_empty() && self.high.is_empty()
    }

    /// Non-empty tiers, blockers first.
    pub fn tiers(&self) -> Vec<(Severity, &[Finding])> {
        [
            (Severity::Blocker, self.blockers.as_slice()),
            (Severity::High, self.high.as_slice()),
        ]
        .into_iter()
        .filter(|(_, items)| !items.is_empty())
        .collect()
    }
}

/// Title of a tagged item: the first bold segment that is not the tag itself, else the
/// item text with the tag removed.
fn item_title(body: &str) -> Option<String> {
    let bold = BOLD_REGEX
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|s| !s.is_empty() && !TAG_REGEX.is_match(s));

    let title = match bold {
        Some(t) => t.to_string(),
        None => TAG_REGEX
            .replace(body, "")
            .replace("**", "")
            .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ':')
            .to_string(),
    };

    (!title.is_empty()).then_some(title)
}

/// Extract `[BLOCKER]` and `[HIGH]` items from a findings document.
pub fn parse_findings(text: &str) -> Findings {
    let mut findings = Findings::default();

    for (idx, line) in text.lines().enumerate() {
        let Some(body) = NUMBERED_ITEM_REGEX
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };
        let Some(tag) = TAG_REGEX.captures(body).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(title) = item_title(body) else {
            continue;
        };

        let severity = if tag.as_str().eq_ignore_ascii_case("BLOCKER") {
            Severity::Blocker
        } else {
            Severity::High
        };
        let finding = Finding {
            severity,
            title,
            line: idx + 1,
        };
        match severity {
            Severity::Blocker => findings.blockers.push(finding),
            _ => findings.high.push(finding),
        }
    }

    debug!(
        blockers = findings.blockers.len(),
        high = findings.high.len(),
        "parsed findings"
    );
    findings
}

/// Read and parse the findings document. `None` when it does not exist or cannot be read.
pub fn load_findings(path: &Path) -> Option<Findings> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(parse_findings(&text))
}
