use crate::agent::ExecutionResult;
use crate::ui::icons::{CHECK, CLOCK, CROSS};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Live terminal view of running agent processes, rendered via `indicatif`.
///
/// One spinner per in-flight invocation; preparation stacks several at once, execution and
/// review show one at a time. Disabled displays draw to a hidden target, so callers never
/// branch on whether progress is shown.
pub struct AgentProgress {
    multi: MultiProgress,
    verbose: bool,
}

impl AgentProgress {
    pub fn new(enabled: bool, verbose: bool) -> Self {
        let multi = if enabled {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi, verbose }
    }

    /// A display that never draws.
    pub fn hidden() -> Self {
        Self::new(false, false)
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Add a spinner for a newly spawned invocation.
    pub fn start_task(&self, label: &str) -> ProgressBar {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix(label.to_string());
        bar.set_message(format!("{}", style("(starting...)").dim()));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    /// Refresh a spinner from a watchdog poll.
    ///
    /// `grew` is whether the capture file got larger since the previous poll.
    pub fn update(&self, bar: &ProgressBar, elapsed: Duration, captured_bytes: u64, grew: bool) {
        let activity = if grew {
            style("active").green()
        } else {
            style("quiet").dim()
        };
        bar.set_message(format!(
            "{} {} {}",
            format_elapsed(elapsed),
            activity,
            style(format!("({} bytes)", captured_bytes)).dim()
        ));
    }

    /// Stop a spinner, leaving a one-line verdict in place.
    pub fn finish(&self, bar: &ProgressBar, result: &ExecutionResult) {
        let elapsed = format_elapsed(result.duration);
        let msg = if result.timed_out {
            format!("{}{}", CLOCK, style(format!("timed out after {}", elapsed)).yellow())
        } else if result.success {
            format!("{}done in {}", CHECK, elapsed)
        } else {
            format!(
                "{}{}",
                CROSS,
                style(format!("failed after {}: {}", elapsed, result.failure_reason())).red()
            )
        };
        if self.verbose {
            bar.finish_with_message(msg);
        } else {
            bar.finish_and_clear();
            self.println(format!("{} {}", style(bar.prefix()).bold().dim(), msg));
        }
    }
}

/// `Xs` below a minute, `Xm Ys` from there on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "59s");
        assert_eq!(format_elapsed(Duration::from_secs(60)), "1m 0s");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "62m 5s");
    }

    #[test]
    fn test_hidden_display_accepts_full_lifecycle() {
        let ui = AgentProgress::hidden();
        let bar = ui.start_task("phase-01-plan");
        ui.update(&bar, Duration::from_secs(5), 120, true);
        ui.update(&bar, Duration::from_secs(10), 120, false);
        let result = ExecutionResult::exited(Some(0), Duration::from_secs(10), String::new());
        ui.finish(&bar, &result);
        assert!(bar.is_finished());
    }
}
