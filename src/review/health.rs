//! Health snapshot extraction from free-form review text.
//!
//! Score rules, tried in order (first match wins):
//!
//! 1. `health_with_grade`: `Health: 85/100 (Grade: B)`
//! 2. `health_with_grade_line`: `Health: 85/100`, grade taken from a separate `Grade: B` line
//! 3. `bare_score`: the first `85/100` anywhere in the text
//!
//! Severity counts, per tier, tried in order:
//!
//! 1. `upper_pipe`: `BLOCKER | 2`
//! 2. `title_table`: `| Blocker | 2 |`
//!
//! A tier matched by neither rule counts as zero. Parsing never fails on malformed
//! input; it returns `None` only when no score rule matches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static HEALTH_WITH_GRADE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhealth\**\s*:\s*\**\s*(\d{1,3})\s*/\s*100\s*\**\s*\(\s*grade\s*:\s*([A-F][+-]?)\s*\)")
        .unwrap()
});

static HEALTH_ONLY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhealth\**\s*:\s*\**\s*(\d{1,3})\s*/\s*100\b").unwrap()
});

static GRADE_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s>#*|-]*grade\**\s*:\s*\**\s*([A-F][+-]?)(?:[\s*|]|$)").unwrap()
});

static BARE_SCORE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})\s*/\s*100\b").unwrap());

/// Finding severity tiers, most critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Blocker, Self::High, Self::Medium, Self::Low];

    /// Spelling used in `LABEL | n` rows and `[LABEL]` tags.
    pub fn upper(&self) -> &'static str {
        match self {
            Self::Blocker => "BLOCKER",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Spelling used in `| Label | n |` table rows.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Blocker => "Blocker",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.upper().to_lowercase())
    }
}

/// Parsed result of one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// 0..=100
    pub score: u8,
    pub grade: String,
    pub blockers: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub total: u32,
    /// Name of the score rule that matched
    pub score_rule: &'static str,
}

/// Named score extraction rule returning `(score, grade if present)`.
struct ScoreRule {
    name: &'static str,
    extract: fn(&str) -> Option<(u32, Option<String>)>,
}

fn health_with_grade(text: &str) -> Option<(u32, Option<String>)> {
    let caps = HEALTH_WITH_GRADE_REGEX.captures(text)?;
    let score = caps.get(1)?.as_str().parse().ok()?;
    Some((score, Some(caps.get(2)?.as_str().to_string())))
}

fn health_with_grade_line(text: &str) -> Option<(u32, Option<String>)> {
    let caps = HEALTH_ONLY_REGEX.captures(text)?;
    let score = caps.get(1)?.as_str().parse().ok()?;
    let grade = GRADE_LINE_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    Some((score, grade))
}

fn bare_score(text: &str) -> Option<(u32, Option<String>)> {
    let caps = BARE_SCORE_REGEX.captures(text)?;
    let score = caps.get(1)?.as_str().parse().ok()?;
    Some((score, None))
}

const SCORE_RULES: &[ScoreRule] = &[
    ScoreRule {
        name: "health_with_grade",
        extract: health_with_grade,
    },
    ScoreRule {
        name: "health_with_grade_line",
        extract: health_with_grade_line,
    },
    ScoreRule {
        name: "bare_score",
        extract: bare_score,
    },
];

/// Compiled `(upper_pipe, title_table)` rules per severity, in `Severity::ALL` order.
static SEVERITY_RULES: LazyLock<Vec<(Severity, Regex, Regex)>> = LazyLock::new(|| {
    Severity::ALL
        .iter()
        .map(|sev| {
            let upper_pipe = Regex::new(&format!(r"\b{}\s*\|\s*(\d+)", sev.upper())).unwrap();
            let title_table =
                Regex::new(&format!(r"\|\s*{}\s*\|\s*(\d+)\s*\|", sev.title())).unwrap();
            (*sev, upper_pipe, title_table)
        })
        .collect()
});

/// Letter grade for a score when the review did not state one.
pub fn grade_for_score(score: u8) -> &'static str {
    match score {
        90..=100 => "A",
        80..=89 => "B",
        70..=79 => "C",
        60..=69 => "D",
        _ => "F",
    }
}

/// Count of findings for `severity`, zero when no row mentions it.
pub fn severity_count(text: &str, severity: Severity) -> u32 {
    SEVERITY_RULES
        .iter()
        .find(|(sev, _, _)| *sev == severity)
        .and_then(|(_, upper_pipe, title_table)| {
            [upper_pipe, title_table].into_iter().find_map(|re| {
                re.captures(text)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok())
            })
        })
        .unwrap_or(0)
}

/// Extract a health snapshot from review text, or `None` if no score is present.
pub fn parse_health(text: &str) -> Option<HealthSnapshot> {
    let (rule, (raw_score, grade)) = SCORE_RULES
        .iter()
        .find_map(|rule| (rule.extract)(text).map(|hit| (rule.name, hit)))?;

    let score = raw_score.min(100) as u8;
    let grade = grade
        .map(|g| g.to_uppercase())
        .unwrap_or_else(|| grade_for_score(score).to_string());

    let blockers = severity_count(text, Severity::Blocker);
    let high = severity_count(text, Severity::High);
    let medium = severity_count(text, Severity::Medium);
    let low = severity_count(text, Severity::Low);

    debug!(rule, score, %grade, blockers, high, medium, low, "parsed health");

    Some(HealthSnapshot {
        score,
        grade,
        blockers,
        high,
        medium,
        low,
        total: blockers
            .saturating_add(high)
            .saturating_add(medium)
            .saturating_add(low),
        score_rule: rule,
    })
}

/// Parse the captured review output, falling back to the review report file.
pub fn parse_review(captured_output: &str, report_file: &Path) -> Option<HealthSnapshot> {
    parse_health(captured_output).or_else(|| {
        let text = std::fs::read_to_string(report_file).ok()?;
        debug!(path = %report_file.display(), "no score in captured output, using report file");
        parse_health(&text)
    })
}
