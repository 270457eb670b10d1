//! The seam between the orchestrator and the external coding agent.
//!
//! Everything above this module treats an agent command as an opaque string. The only
//! implementation that touches OS processes is [`Watchdog`]; schedulers and the
//! improvement loop depend on the [`AgentRunner`] trait so tests can script results.

mod result;
mod watchdog;

pub use result::ExecutionResult;
pub use watchdog::Watchdog;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::OrchestratorError;

/// One opaque instruction for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    pub command: String,
    pub max_turns: u32,
    /// Keys the capture sink; unique among concurrently running invocations.
    pub label: String,
}

impl AgentInvocation {
    pub fn new(command: impl Into<String>, max_turns: u32, label: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            max_turns,
            label: label.into(),
        }
    }
}

/// Upper bound for a deadline, roughly thirty years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Deadline `timeout` from now; timeouts too large to represent mean "no deadline".
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout.min(FAR_FUTURE)
}

/// Runs agent invocations under a deadline.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `invocation`, force-terminating it at `deadline`.
    ///
    /// `Err` is reserved for failures that prevent the process from existing at all.
    async fn run_until(
        &self,
        invocation: &AgentInvocation,
        deadline: Instant,
    ) -> Result<ExecutionResult, OrchestratorError>;

    /// Run `invocation` with its own timeout budget.
    async fn run(
        &self,
        invocation: &AgentInvocation,
        timeout: Duration,
    ) -> Result<ExecutionResult, OrchestratorError> {
        self.run_until(invocation, deadline_after(timeout)).await
    }

    /// Like [`AgentRunner::run_until`], but a launch failure becomes a failed result.
    async fn attempt(&self, invocation: &AgentInvocation, deadline: Instant) -> ExecutionResult {
        let start = Instant::now();
        match self.run_until(invocation, deadline).await {
            Ok(result) => result,
            Err(e) => {
                warn!(label = %invocation.label, error = %e, "agent invocation could not start");
                ExecutionResult::failure(e.to_string(), start.elapsed())
            }
        }
    }
}
