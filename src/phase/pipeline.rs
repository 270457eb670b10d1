//! Preparation pipeline construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::status::{PhaseState, PhaseStatus};

/// One preparation step for a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepStep {
    Research,
    Plan,
}

impl fmt::Display for PrepStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Plan => write!(f, "plan"),
        }
    }
}

/// Compute the preparation steps still needed for a phase, in execution order.
///
/// Research is emitted only for a `pending` phase; a plan step is emitted for any phase
/// without plan files. When both are present research always comes first, so the plan
/// step can rely on the research artifact produced earlier in the same chain.
pub fn build_steps(state: &PhaseState, skip_research: bool, skip_planning: bool) -> Vec<PrepStep> {
    let mut steps = Vec::new();

    if !skip_research && state.status == PhaseStatus::Pending {
        steps.push(PrepStep::Research);
    }

    if !skip_planning && matches!(state.status, PhaseStatus::Pending | PhaseStatus::Researched) {
        steps.push(PrepStep::Plan);
    }

    steps
}
