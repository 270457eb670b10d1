//! Reading what the review agent left behind and turning it into new work.
//!
//! - [`health`]: score, grade and severity counts from the review text
//! - [`findings`]: `[BLOCKER]`/`[HIGH]` items from the findings document
//! - [`remediation`]: new roadmap phases synthesized from those items

pub mod findings;
pub mod health;
pub mod remediation;

pub use findings::{Finding, Findings, load_findings, parse_findings};
pub use health::{HealthSnapshot, Severity, grade_for_score, parse_health, parse_review};
pub use remediation::{RemediationPhase, Synthesis, synthesize};
