use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;

use autopilot::config::CliOverrides;
use autopilot::project::{ProjectPaths, find_project_root};
use autopilot::ui::icons::CROSS;

mod cmd;

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(
    version,
    about = "Drive roadmap phases through research, planning, execution and review"
)]
pub struct Cli {
    /// Directory to start the project root search from (defaults to the current directory)
    #[arg(long)]
    pub project_path: Option<PathBuf>,

    /// First phase to run (0 = first incomplete roadmap phase)
    #[arg(long, default_value = "0")]
    pub start_phase: u32,

    /// Last phase to run (0 = last roadmap phase)
    #[arg(long, default_value = "0")]
    pub end_phase: u32,

    /// Turn cap passed to every agent invocation [default: 50]
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Preparation batch timeout in minutes [default: 30]
    #[arg(long)]
    pub prep_timeout: Option<u64>,

    /// Per-phase execution timeout in minutes [default: 60]
    #[arg(long)]
    pub execute_timeout: Option<u64>,

    /// Review timeout in minutes [default: 30]
    #[arg(long)]
    pub review_timeout: Option<u64>,

    /// Never run the research step
    #[arg(long)]
    pub skip_research: bool,

    /// Never run the planning step
    #[arg(long)]
    pub skip_planning: bool,

    /// Stop after preparation
    #[arg(long)]
    pub prepare_only: bool,

    /// Print what would run without spawning anything or writing state
    #[arg(long)]
    pub dry_run: bool,

    /// After execution, review and remediate until the target score is met
    #[arg(long)]
    pub continuous_improvement: bool,

    /// Health score the improvement loop aims for [default: 90]
    #[arg(long)]
    pub target_score: Option<u8>,

    /// Maximum review iterations [default: 3]
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Stop the improvement loop when the score does not improve
    #[arg(long)]
    pub stop_on_no_improvement: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Hide the live progress spinners
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            start_phase: self.start_phase,
            end_phase: self.end_phase,
            max_turns: self.max_turns,
            prep_timeout_minutes: self.prep_timeout,
            execute_timeout_minutes: self.execute_timeout,
            review_timeout_minutes: self.review_timeout,
            skip_research: self.skip_research,
            skip_planning: self.skip_planning,
            prepare_only: self.prepare_only,
            dry_run: self.dry_run,
            continuous_improvement: self.continuous_improvement,
            target_score: self.target_score,
            max_iterations: self.max_iterations,
            stop_on_no_improvement: self.stop_on_no_improvement,
            verbose: self.verbose,
            no_progress: self.no_progress,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let start = match cli.project_path.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let root = match find_project_root(&start) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("{}{}", CROSS, style(e).red());
            std::process::exit(1);
        }
    };
    let paths = ProjectPaths::new(root);

    if cli.dry_run {
        cmd::cmd_dry_run(paths, cli.overrides());
    } else {
        cmd::run_autopilot(paths, cli.overrides()).await;
    }
    Ok(())
}
