use std::sync::Arc;
use tracing::{info, warn};

use super::{ImprovementConfig, ImprovementOutcome, IterationRecord, StopReason};
use crate::agent::{AgentInvocation, AgentRunner, deadline_after};
use crate::orchestrator::{execute_all, prepare_all};
use crate::phase::Roadmap;
use crate::project::ProjectPaths;
use crate::report::RunStats;
use crate::review::{HealthSnapshot, load_findings, parse_review, synthesize};

/// Decision after a successfully parsed review.
fn decide(
    health: &HealthSnapshot,
    previous: Option<&HealthSnapshot>,
    config: &ImprovementConfig,
) -> Option<StopReason> {
    if health.score >= config.target_score && health.blockers == 0 {
        return Some(StopReason::TargetReached);
    }
    if config.stop_on_no_improvement
        && let Some(prev) = previous
        && health.score <= prev.score
    {
        return Some(StopReason::Stagnation {
            previous: prev.score,
            current: health.score,
        });
    }
    None
}

/// Run the review/remediation loop until a stop condition fires or iterations run out.
///
/// `stats` is returned with every prepare/execute stage of the loop recorded into it.
pub async fn run_improvement(
    runner: Arc<dyn AgentRunner>,
    paths: &ProjectPaths,
    config: &ImprovementConfig,
    mut stats: RunStats,
) -> (ImprovementOutcome, RunStats) {
    let report_file = paths.resolve(&config.report_file);
    let findings_file = paths.resolve(&config.findings_file);

    let mut history: Vec<IterationRecord> = Vec::new();
    let mut previous: Option<HealthSnapshot> = None;
    let mut initial_health: Option<HealthSnapshot> = None;
    let mut stop_reason: Option<StopReason> = None;

    for iteration in 1..=config.max_iterations {
        let mut record = IterationRecord {
            iteration,
            health: None,
            phases_created: Vec::new(),
            phases_executed: Vec::new(),
            synthesis_error: None,
            stop_reason: None,
        };

        info!(iteration, max = config.max_iterations, "running review");
        let invocation = AgentInvocation::new(
            config.commands.review.clone(),
            config.max_turns,
            format!("review-iter-{}", iteration),
        );
        let review = runner
            .attempt(&invocation, deadline_after(config.review_timeout))
            .await;

        let stop = if review.timed_out {
            Some(StopReason::ReviewTimeout)
        } else if !review.success {
            Some(StopReason::ReviewFailed {
                exit_code: review.exit_code,
            })
        } else {
            None
        };
        if let Some(reason) = stop {
            warn!(iteration, %reason, "stopping improvement loop");
            record.stop_reason = Some(reason.clone());
            history.push(record);
            stop_reason = Some(reason);
            break;
        }

        tokio::time::sleep(config.settle_delay).await;

        let Some(health) = parse_review(&review.captured_output, &report_file) else {
            warn!(iteration, "review produced no parsable health score");
            record.stop_reason = Some(StopReason::UnparsableScore);
            history.push(record);
            stop_reason = Some(StopReason::UnparsableScore);
            break;
        };
        info!(
            iteration,
            score = health.score,
            grade = %health.grade,
            blockers = health.blockers,
            high = health.high,
            "review parsed"
        );
        initial_health.get_or_insert_with(|| health.clone());
        record.health = Some(health.clone());

        if let Some(reason) = decide(&health, previous.as_ref(), config) {
            info!(iteration, %reason, "stopping improvement loop");
            record.stop_reason = Some(reason.clone());
            history.push(record);
            previous = Some(health);
            stop_reason = Some(reason);
            break;
        }

        let stop = match load_findings(&findings_file) {
            None => Some(StopReason::MissingFindings),
            Some(findings) if findings.is_empty() => Some(StopReason::NoCriticalFindings),
            Some(findings) => {
                let synthesis = synthesize(paths, &findings, iteration);
                record.phases_created = synthesis.numbers();
                match synthesis.error {
                    Some(e) if synthesis.created.is_empty() => Some(StopReason::SynthesisFailed {
                        reason: e.to_string(),
                    }),
                    Some(e) => {
                        warn!(
                            iteration,
                            error = %e,
                            created = ?record.phases_created,
                            "remediation synthesis stopped early; continuing with created phases"
                        );
                        record.synthesis_error = Some(e.to_string());
                        None
                    }
                    None => None,
                }
            }
        };
        if let Some(reason) = stop {
            warn!(iteration, %reason, path = %findings_file.display(), "stopping improvement loop");
            record.stop_reason = Some(reason.clone());
            history.push(record);
            previous = Some(health);
            stop_reason = Some(reason);
            break;
        }

        let pending: Vec<u32> = match Roadmap::load(&paths.roadmap) {
            Ok(roadmap) => roadmap
                .incomplete_phases(paths)
                .into_iter()
                .filter(|n| record.phases_created.contains(n))
                .collect(),
            Err(e) => {
                warn!(iteration, error = %e, "could not re-read roadmap");
                Vec::new()
            }
        };
        if pending.is_empty() {
            warn!(iteration, "no new phases registered; stopping improvement loop");
            record.stop_reason = Some(StopReason::NoNewPhases);
            history.push(record);
            previous = Some(health);
            stop_reason = Some(StopReason::NoNewPhases);
            break;
        }

        info!(iteration, phases = ?pending, "remediating");
        let prepared = prepare_all(
            Arc::clone(&runner),
            &paths.phases_dir,
            &pending,
            &config.prepare_options(),
        )
        .await;
        stats = stats.record_prepare(&prepared);

        let executed = execute_all(
            runner.as_ref(),
            &paths.phases_dir,
            &pending,
            &config.execute_options(),
        )
        .await;
        stats = stats.record_execute(&executed);
        record.phases_executed = executed.executed();

        history.push(record);
        previous = Some(health);
    }

    let outcome = ImprovementOutcome {
        history,
        stop_reason: stop_reason.unwrap_or(StopReason::MaxIterations),
        initial_health,
        final_health: previous,
    };
    info!(
        iterations = outcome.history.len(),
        reason = %outcome.stop_reason,
        "improvement loop finished"
    );
    (outcome, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{PhaseStatus, classify, find_phase_dir};
    use crate::test_support::{ScriptedRunner, Step};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    const FINDINGS: &str = "1. [BLOCKER] **Crash on empty input**\n2. [HIGH] **Unbounded retries**\n";

    fn project() -> (tempfile::TempDir, ProjectPaths) {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let base = paths.phases_dir.join("01-base");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("01-01-PLAN.md"), "").unwrap();
        fs::write(base.join("01-01-SUMMARY.md"), "").unwrap();
        fs::write(&paths.roadmap, "# Roadmap\n\n- [x] **Phase 1: base** — done\n").unwrap();
        (dir, paths)
    }

    fn write_findings(paths: &ProjectPaths, text: &str) {
        let path = paths.resolve(&ImprovementConfig::default().findings_file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config(max_iterations: u32) -> ImprovementConfig {
        ImprovementConfig {
            max_iterations,
            settle_delay: Duration::ZERO,
            review_timeout: Duration::from_secs(5),
            prep_timeout: Duration::from_secs(5),
            execute_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn health(score: u8, blockers: u32) -> String {
        format!("Health: {}/100 (Grade: C)\n| BLOCKER | {} |\n", score, blockers)
    }

    /// Answers the n-th review with `reviews[n]` and completes executed phases.
    fn agent(phases_dir: &std::path::Path, reviews: Vec<Option<String>>) -> Arc<ScriptedRunner> {
        let phases_dir = phases_dir.to_path_buf();
        let count = AtomicUsize::new(0);
        Arc::new(ScriptedRunner::new(move |inv| {
            if inv.command == "/gsd:review" {
                let n = count.fetch_add(1, Ordering::SeqCst);
                return match reviews.get(n).cloned().flatten() {
                    Some(text) => Step::output(text),
                    None => Step::output("review done, see report"),
                };
            }
            if let Some(n) = inv.command.strip_prefix("/gsd:execute-phase ") {
                let n: u32 = n.parse().unwrap();
                let dir = find_phase_dir(&phases_dir, n).unwrap();
                fs::write(dir.join(format!("{:02}-01-SUMMARY.md", n)), "").unwrap();
            }
            Step::ok()
        }))
    }

    #[tokio::test]
    async fn test_target_reached_on_second_iteration() {
        let (_dir, paths) = project();
        write_findings(&paths, "1. [HIGH] **Missing input validation**\n");
        let runner = agent(&paths.phases_dir, vec![Some(health(72, 0)), Some(health(93, 0))]);

        let (outcome, stats) =
            run_improvement(runner.clone(), &paths, &config(3), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.history[0].phases_created, vec![2]);
        assert_eq!(outcome.history[0].phases_executed, vec![2]);
        assert_eq!(outcome.history[0].stop_reason, None);
        assert_eq!(outcome.history[1].stop_reason, Some(StopReason::TargetReached));
        assert_eq!(outcome.initial_health.unwrap().score, 72);
        assert_eq!(outcome.final_health.unwrap().score, 93);
        assert_eq!(stats.executed, 1);
        assert_eq!(classify(&paths.phases_dir, 2), PhaseStatus::Complete);
    }

    #[tokio::test]
    async fn test_unparsable_score_stops_at_second_iteration() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        let runner = agent(&paths.phases_dir, vec![Some(health(50, 1))]);

        let (outcome, _) =
            run_improvement(runner.clone(), &paths, &config(3), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::UnparsableScore);
        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.history[1].health.is_none());
        let reviews = runner
            .commands()
            .iter()
            .filter(|c| c.as_str() == "/gsd:review")
            .count();
        assert_eq!(reviews, 2);
    }

    #[tokio::test]
    async fn test_stagnation_stops_even_below_target() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        let runner = agent(&paths.phases_dir, vec![Some(health(60, 1)), Some(health(60, 1))]);
        let mut cfg = config(5);
        cfg.stop_on_no_improvement = true;

        let (outcome, _) = run_improvement(runner, &paths, &cfg, RunStats::default()).await;

        assert_eq!(
            outcome.stop_reason,
            StopReason::Stagnation {
                previous: 60,
                current: 60
            }
        );
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn test_improving_scores_do_not_stagnate() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        let runner = agent(
            &paths.phases_dir,
            vec![Some(health(60, 1)), Some(health(70, 1)), Some(health(80, 1))],
        );
        let mut cfg = config(3);
        cfg.stop_on_no_improvement = true;

        let (outcome, _) = run_improvement(runner, &paths, &cfg, RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert_eq!(outcome.history.len(), 3);
    }

    #[tokio::test]
    async fn test_history_never_exceeds_max_iterations() {
        for max in 0..=3 {
            let (_dir, paths) = project();
            write_findings(&paths, FINDINGS);
            let reviews = (0..5).map(|_| Some(health(40, 2))).collect();
            let runner = agent(&paths.phases_dir, reviews);

            let (outcome, _) =
                run_improvement(runner, &paths, &config(max), RunStats::default()).await;

            assert!(outcome.history.len() <= max as usize);
            assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        }
    }

    #[tokio::test]
    async fn test_blockers_prevent_target_even_with_high_score() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        let runner = agent(&paths.phases_dir, vec![Some(health(95, 1))]);

        let (outcome, _) = run_improvement(runner, &paths, &config(1), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert_eq!(outcome.history[0].phases_created, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_review_failure_stops_immediately() {
        let (_dir, paths) = project();
        let runner = Arc::new(ScriptedRunner::new(|_| Step::exit(2)));

        let (outcome, _) =
            run_improvement(runner.clone(), &paths, &config(3), RunStats::default()).await;

        assert_eq!(
            outcome.stop_reason,
            StopReason::ReviewFailed { exit_code: Some(2) }
        );
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_review_timeout_stops_immediately() {
        let (_dir, paths) = project();
        let runner = Arc::new(ScriptedRunner::new(|_| Step::hang()));
        let mut cfg = config(3);
        cfg.review_timeout = Duration::from_millis(100);

        let (outcome, _) = run_improvement(runner, &paths, &cfg, RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::ReviewTimeout);
    }

    #[tokio::test]
    async fn test_missing_findings_document() {
        let (_dir, paths) = project();
        let runner = agent(&paths.phases_dir, vec![Some(health(50, 1))]);

        let (outcome, _) = run_improvement(runner, &paths, &config(3), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::MissingFindings);
        assert_eq!(outcome.history[0].score(), Some(50));
    }

    #[tokio::test]
    async fn test_no_critical_findings() {
        let (_dir, paths) = project();
        write_findings(&paths, "1. [MEDIUM] **Naming**\n");
        let runner = agent(&paths.phases_dir, vec![Some(health(50, 0))]);

        let (outcome, _) = run_improvement(runner, &paths, &config(3), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::NoCriticalFindings);
        assert_eq!(Roadmap::load(&paths.roadmap).unwrap().phase_numbers(), vec![1]);
    }

    #[tokio::test]
    async fn test_synthesis_failure_with_nothing_created_stops() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        // The review agent deletes the roadmap, so synthesis cannot number anything
        let roadmap = paths.roadmap.clone();
        let runner = Arc::new(ScriptedRunner::new(move |_| {
            let _ = fs::remove_file(&roadmap);
            Step::output(health(50, 1))
        }));

        let (outcome, _) =
            run_improvement(runner.clone(), &paths, &config(3), RunStats::default()).await;

        assert!(matches!(
            outcome.stop_reason,
            StopReason::SynthesisFailed { .. }
        ));
        assert_eq!(outcome.history.len(), 1);
        assert!(outcome.history[0].phases_created.is_empty());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_synthesis_still_remediates_created_phases() {
        let (_dir, paths) = project();
        write_findings(&paths, FINDINGS);
        // Blocks the high-tier phase directory; the blocker tier still gets phase 2
        fs::write(paths.phases_dir.join("03-fix-high-iter-1"), "in the way").unwrap();
        let runner = agent(&paths.phases_dir, vec![Some(health(50, 1))]);

        let (outcome, stats) =
            run_improvement(runner.clone(), &paths, &config(1), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        let record = &outcome.history[0];
        assert_eq!(record.phases_created, vec![2]);
        assert_eq!(record.phases_executed, vec![2]);
        let err = record.synthesis_error.as_deref().unwrap();
        assert!(err.contains("Failed to create phase directory"), "{}", err);
        assert!(
            runner
                .commands()
                .iter()
                .any(|c| c.as_str() == "/gsd:execute-phase 2")
        );
        assert_eq!(stats.executed, 1);
        assert_eq!(classify(&paths.phases_dir, 2), PhaseStatus::Complete);
    }

    #[tokio::test]
    async fn test_falls_back_to_report_file() {
        let (_dir, paths) = project();
        let report = paths.resolve(&ImprovementConfig::default().report_file);
        fs::create_dir_all(report.parent().unwrap()).unwrap();
        fs::write(&report, health(91, 0)).unwrap();
        let runner = agent(&paths.phases_dir, vec![None]);

        let (outcome, _) = run_improvement(runner, &paths, &config(3), RunStats::default()).await;

        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert_eq!(outcome.final_health.unwrap().score, 91);
    }
}
