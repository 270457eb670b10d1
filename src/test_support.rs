//! Scripted agent used by unit tests in place of a real process.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::agent::{AgentInvocation, AgentRunner, ExecutionResult};
use crate::errors::OrchestratorError;

/// What the scripted agent does for one invocation.
#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub exit_code: Option<i32>,
    pub output: String,
}

impl Step {
    pub fn ok() -> Self {
        Self {
            delay: Duration::ZERO,
            exit_code: Some(0),
            output: String::new(),
        }
    }

    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::ok()
        }
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::ok()
        }
    }

    /// Runs far longer than any test deadline.
    pub fn hang() -> Self {
        Self {
            delay: Duration::from_secs(3600),
            ..Self::ok()
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Box<dyn Fn(&AgentInvocation) -> Step + Send + Sync>;

/// Records every invocation and answers from a handler closure.
///
/// The handler runs when the invocation starts, so it can write the artifacts a real
/// agent would leave behind before the result is returned.
pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<AgentInvocation>>,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&AgentInvocation) -> Step + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every invocation succeeds immediately without side effects.
    pub fn succeeding() -> Self {
        Self::new(|_| Step::ok())
    }

    pub fn calls(&self) -> Vec<AgentInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run_until(
        &self,
        invocation: &AgentInvocation,
        deadline: Instant,
    ) -> Result<ExecutionResult, OrchestratorError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let step = (self.handler)(invocation);

        let start = Instant::now();
        if start + step.delay > deadline {
            tokio::time::sleep_until(deadline).await;
            return Ok(ExecutionResult::timed_out(start.elapsed(), step.output));
        }
        tokio::time::sleep(step.delay).await;
        Ok(ExecutionResult::exited(step.exit_code, start.elapsed(), step.output))
    }
}
