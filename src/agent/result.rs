use serde::Serialize;
use std::time::Duration;

/// Outcome of one supervised agent invocation (or one prep chain).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub timed_out: bool,
    /// `None` when the process reported no exit code; `Some(-1)` after a deadline kill.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    #[serde(skip)]
    pub captured_output: String,
}

impl ExecutionResult {
    /// A process that exited on its own. A missing exit code counts as success.
    pub fn exited(exit_code: Option<i32>, duration: Duration, captured_output: String) -> Self {
        Self {
            success: exit_code.is_none_or(|code| code == 0),
            timed_out: false,
            exit_code,
            duration,
            captured_output,
        }
    }

    /// A process killed at its deadline.
    pub fn timed_out(duration: Duration, captured_output: String) -> Self {
        Self {
            success: false,
            timed_out: true,
            exit_code: Some(-1),
            duration,
            captured_output,
        }
    }

    /// A failure that never produced a process exit (spawn error, missing plans).
    pub fn failure(reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            timed_out: false,
            exit_code: None,
            duration,
            captured_output: reason.into(),
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration.as_secs_f64() / 60.0
    }

    /// One-line reason for a failed result, used by the report.
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            format!("timed out after {:.1} min", self.duration_minutes())
        } else if let Some(code) = self.exit_code {
            format!("exited with code {}", code)
        } else {
            self.captured_output
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("failed")
                .trim()
                .to_string()
        }
    }
}
