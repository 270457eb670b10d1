//! Integration tests for the autopilot binary.
//!
//! These drive the real binary against scratch projects, with a shell script standing in
//! for the coding agent.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ROADMAP: &str = "# Roadmap\n\
\n\
- [x] **Phase 1: base** — scaffolding\n\
- [ ] **Phase 2: api** — endpoints\n\
- [ ] **Phase 3: ui** — screens\n";

/// Helper to create an autopilot Command
fn autopilot() -> Command {
    cargo_bin_cmd!("autopilot")
}

/// Project with one complete phase, one pending and one researched.
fn create_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let planning = dir.path().join(".planning");
    fs::create_dir_all(planning.join("phases")).unwrap();
    fs::write(planning.join("ROADMAP.md"), ROADMAP).unwrap();

    let base = planning.join("phases/01-base");
    fs::create_dir_all(&base).unwrap();
    fs::write(base.join("01-01-PLAN.md"), "").unwrap();
    fs::write(base.join("01-01-SUMMARY.md"), "").unwrap();

    fs::create_dir_all(planning.join("phases/02-api")).unwrap();

    let ui = planning.join("phases/03-ui");
    fs::create_dir_all(&ui).unwrap();
    fs::write(ui.join("03-RESEARCH.md"), "").unwrap();

    dir
}

fn phase_dir(project: &TempDir, name: &str) -> PathBuf {
    project.path().join(".planning/phases").join(name)
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A fake agent that produces the artifact each command is expected to leave behind.
#[cfg(unix)]
fn fake_agent(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-agent.sh");
    write_script(
        &path,
        r#"cmd="$2"
n="${cmd##* }"
nn=$(printf '%02d' "$n" 2>/dev/null)
dir=$(ls -d .planning/phases/"$nn"-* 2>/dev/null | head -n 1)
case "$cmd" in
  /gsd:research-phase*) touch "$dir/$nn-RESEARCH.md" ;;
  /gsd:plan-phase*) touch "$dir/$nn-01-PLAN.md" ;;
  /gsd:execute-phase*) touch "$dir/$nn-01-SUMMARY.md" ;;
  /gsd:review*) echo "Health: 95/100 (Grade: A)"; echo "| BLOCKER | 0 |" ;;
esac
echo "done: $cmd"
"#,
    );
    path
}

fn run_reports(project: &TempDir) -> Vec<PathBuf> {
    let runs = project.path().join(".planning/autopilot/runs");
    match fs::read_dir(runs) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_autopilot_help() {
        autopilot()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--continuous-improvement"))
            .stdout(predicate::str::contains("--dry-run"));
    }

    #[test]
    fn test_autopilot_version() {
        autopilot()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("autopilot"));
    }

    #[test]
    fn test_missing_project_root_exits_with_error() {
        let dir = TempDir::new().unwrap();
        autopilot()
            .current_dir(dir.path())
            .arg("--dry-run")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains(".planning/ROADMAP.md"));
    }

    #[test]
    fn test_rejects_non_numeric_phase() {
        autopilot().args(["--start-phase", "two"]).assert().failure();
    }
}

// =============================================================================
// Dry Run
// =============================================================================

mod dry_run {
    use super::*;

    #[test]
    fn test_dry_run_lists_pending_work() {
        let project = create_project();
        autopilot()
            .current_dir(project.path())
            .arg("--dry-run")
            .assert()
            .success()
            .stdout(predicate::str::contains("Phase 2"))
            .stdout(predicate::str::contains("research, plan"))
            .stdout(predicate::str::contains("Phase 3"))
            .stdout(predicate::str::contains("Phase 1 ").not());
    }

    #[test]
    fn test_dry_run_writes_no_state() {
        let project = create_project();
        autopilot()
            .current_dir(project.path())
            .args(["--dry-run", "--start-phase", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("complete"));

        assert!(!project.path().join(".planning/autopilot").exists());
    }

    #[test]
    fn test_dry_run_from_subdirectory() {
        let project = create_project();
        let nested = project.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        autopilot()
            .current_dir(&nested)
            .arg("--dry-run")
            .assert()
            .success()
            .stdout(predicate::str::contains("Phase 2"));
    }

    #[test]
    fn test_project_path_flag() {
        let project = create_project();
        let elsewhere = TempDir::new().unwrap();

        autopilot()
            .current_dir(elsewhere.path())
            .arg("--project-path")
            .arg(project.path())
            .args(["--dry-run", "--skip-research"])
            .assert()
            .success()
            .stdout(predicate::str::contains("research, plan").not())
            .stdout(predicate::str::contains("Phase 2"));
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let project = create_project();
        fs::write(
            project.path().join(".planning/autopilot.toml"),
            "[review\nmax_iterations = \"seven\"\n",
        )
        .unwrap();

        autopilot()
            .current_dir(project.path())
            .args(["--dry-run", "--continuous-improvement"])
            .assert()
            .success()
            .stderr(predicate::str::contains("falling back to defaults"))
            .stdout(predicate::str::contains("at most 3 iterations"));
    }

    #[test]
    fn test_dry_run_mentions_improvement_loop() {
        let project = create_project();
        autopilot()
            .current_dir(project.path())
            .args(["--dry-run", "--continuous-improvement", "--target-score", "80"])
            .assert()
            .success()
            .stdout(predicate::str::contains("score >= 80"));
    }
}

// =============================================================================
// Runs with a fake agent
// =============================================================================

#[cfg(unix)]
mod runs {
    use super::*;

    #[test]
    fn test_prepare_only_plans_without_executing() {
        let project = create_project();
        let agent = fake_agent(&project);

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", &agent)
            .args(["--prepare-only", "--no-progress"])
            .assert()
            .success();

        assert!(phase_dir(&project, "02-api").join("02-RESEARCH.md").exists());
        assert!(phase_dir(&project, "02-api").join("02-01-PLAN.md").exists());
        assert!(phase_dir(&project, "03-ui").join("03-01-PLAN.md").exists());
        assert!(!phase_dir(&project, "02-api").join("02-01-SUMMARY.md").exists());

        let reports = run_reports(&project);
        assert_eq!(reports.len(), 1);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
        assert_eq!(json["stats"]["prepared"], 2);
        assert_eq!(json["stats"]["executed"], 0);
    }

    #[test]
    fn test_full_run_executes_and_captures_output() {
        let project = create_project();
        let agent = fake_agent(&project);

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", &agent)
            .arg("--no-progress")
            .assert()
            .success()
            .stdout(predicate::str::contains("Run summary"));

        assert!(phase_dir(&project, "02-api").join("02-01-SUMMARY.md").exists());
        assert!(phase_dir(&project, "03-ui").join("03-01-SUMMARY.md").exists());

        let capture = project
            .path()
            .join(".planning/autopilot/logs/phase-02-execute.log");
        let output = fs::read_to_string(capture).unwrap();
        assert!(output.contains("done: /gsd:execute-phase 2"));
    }

    #[test]
    fn test_continuous_improvement_stops_at_target() {
        let project = create_project();
        let agent = fake_agent(&project);

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", &agent)
            .args(["--continuous-improvement", "--no-progress"])
            .assert()
            .success()
            .stdout(predicate::str::contains("target score reached"));
    }

    #[test]
    fn test_missing_agent_is_reported_not_fatal() {
        let project = create_project();

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", "/nonexistent/agent-binary")
            .args(["--end-phase", "2", "--no-progress"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Failures"))
            .stdout(predicate::str::contains("Phase 2 (prepare)"));
    }

    #[test]
    fn test_unwritable_state_dir_is_not_fatal() {
        let project = create_project();
        let agent = fake_agent(&project);
        // A file where the state directory belongs
        fs::write(project.path().join(".planning/autopilot"), "").unwrap();

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", &agent)
            .args(["--prepare-only", "--end-phase", "2", "--no-progress"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Run summary"))
            .stderr(predicate::str::contains("logging to stderr only"));
    }

    #[test]
    fn test_config_file_command_templates() {
        let project = create_project();
        let agent = fake_agent(&project);
        fs::write(
            project.path().join(".planning/autopilot.toml"),
            "[commands]\nplan = \"/gsd:plan-phase {phase} --fast\"\n",
        )
        .unwrap();

        autopilot()
            .current_dir(project.path())
            .env("AUTOPILOT_AGENT_CMD", &agent)
            .args(["--prepare-only", "--skip-research", "--no-progress"])
            .assert()
            .success();

        let capture = project
            .path()
            .join(".planning/autopilot/logs/phase-03-plan.log");
        let output = fs::read_to_string(capture).unwrap();
        assert!(output.contains("/gsd:plan-phase 3 --fast"));
    }
}
