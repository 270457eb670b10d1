//! Synthesis of remediation phases from review findings.

use anyhow::Context;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{info, warn};

use super::findings::{Finding, Findings};
use super::health::Severity;
use crate::errors::OrchestratorError;
use crate::phase::{NewRoadmapEntry, Roadmap, append_entry, phase_prefix};
use crate::project::ProjectPaths;

/// A phase created from one severity tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPhase {
    pub number: u32,
    pub slug: String,
    pub severity: Severity,
    pub dir: PathBuf,
    pub plan_file: PathBuf,
    pub task_count: usize,
}

fn tier_slug(severity: Severity) -> &'static str {
    match severity {
        Severity::Blocker => "blockers",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

fn render_plan(number: u32, severity: Severity, iteration: u32, items: &[Finding]) -> String {
    let mut plan = format!(
        "# Phase {}: Fix {} findings (improvement iteration {})\n\n\
         Resolve every {} finding reported by the last review.\n\n## Tasks\n\n",
        number,
        severity.upper(),
        iteration,
        severity.upper()
    );
    for item in items {
        let _ = writeln!(plan, "- [ ] {}", item.title);
    }
    plan
}

/// What [`synthesize`] managed to do.
///
/// Tiers are processed in order and stop at the first error; phases created before the
/// error are already on the roadmap and stay in `created`.
#[derive(Debug, Default)]
pub struct Synthesis {
    pub created: Vec<RemediationPhase>,
    pub error: Option<OrchestratorError>,
}

impl Synthesis {
    pub fn numbers(&self) -> Vec<u32> {
        self.created.iter().map(|p| p.number).collect()
    }
}

/// Create one phase per non-empty tier (blockers first), each numbered from the freshly
/// re-read roadmap, and register it there.
///
/// Each phase gets `NN-fix-<tier>-iter-<i>/NN-01-PLAN.md` listing the tier's finding
/// titles as tasks. Created phases are returned in creation order.
pub fn synthesize(paths: &ProjectPaths, findings: &Findings, iteration: u32) -> Synthesis {
    let mut synthesis = Synthesis::default();

    for (severity, items) in findings.tiers() {
        match synthesize_tier(paths, severity, items, iteration) {
            Ok(Some(phase)) => synthesis.created.push(phase),
            Ok(None) => {}
            Err(e) => {
                warn!(%severity, error = %e, "remediation synthesis stopped");
                synthesis.error = Some(e);
                break;
            }
        }
    }

    synthesis
}

fn synthesize_tier(
    paths: &ProjectPaths,
    severity: Severity,
    items: &[Finding],
    iteration: u32,
) -> Result<Option<RemediationPhase>, OrchestratorError> {
    let number = Roadmap::load(&paths.roadmap)?.next_phase_number();
    let prefix = phase_prefix(number);
    let slug = format!("fix-{}-iter-{}", tier_slug(severity), iteration);
    let dir = paths.phases_dir.join(format!("{}-{}", prefix, slug));
    let plan_name = format!("{}-01-PLAN.md", prefix);
    let plan_file = dir.join(&plan_name);

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create phase directory {}", dir.display()))?;
    std::fs::write(&plan_file, render_plan(number, severity, iteration, items))
        .with_context(|| format!("Failed to write plan {}", plan_file.display()))?;

    let entry = NewRoadmapEntry {
        number,
        slug: slug.clone(),
        description: format!(
            "Resolve {} {} finding{} from review iteration {}",
            items.len(),
            severity,
            if items.len() == 1 { "" } else { "s" },
            iteration
        ),
        goal: format!("No {} findings remain in the next review", severity.upper()),
        plans: vec![plan_name],
    };
    if !append_entry(&paths.roadmap, &entry)? {
        warn!(phase = number, "roadmap already lists this phase; not re-registering");
        return Ok(None);
    }

    info!(phase = number, %slug, tasks = items.len(), "created remediation phase");
    Ok(Some(RemediationPhase {
        number,
        slug,
        severity,
        dir,
        plan_file,
        task_count: items.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{PhaseStatus, classify};
    use crate::review::findings::parse_findings;
    use std::fs;
    use tempfile::tempdir;

    fn project(roadmap: &str) -> (tempfile::TempDir, ProjectPaths) {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        fs::create_dir_all(&paths.phases_dir).unwrap();
        fs::write(&paths.roadmap, roadmap).unwrap();
        (dir, paths)
    }

    #[test]
    fn test_one_phase_per_tier_blockers_first() {
        let (_dir, paths) = project("- [x] **Phase 1: base** — done\n- [ ] **Phase 2: api**\n");
        let findings = parse_findings(
            "1. [HIGH] **Slow queries**\n2. [BLOCKER] **Crash on start**\n3. [HIGH] **No retries**\n",
        );

        let created = synthesize(&paths, &findings, 1).created;

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].number, 3);
        assert_eq!(created[0].severity, Severity::Blocker);
        assert_eq!(created[0].slug, "fix-blockers-iter-1");
        assert_eq!(created[1].number, 4);
        assert_eq!(created[1].slug, "fix-high-iter-1");
        assert_eq!(created[1].task_count, 2);

        let plan = fs::read_to_string(&created[1].plan_file).unwrap();
        assert!(plan.contains("- [ ] Slow queries\n- [ ] No retries\n"));
        assert!(created[0].dir.ends_with("03-fix-blockers-iter-1"));

        let roadmap = Roadmap::load(&paths.roadmap).unwrap();
        assert_eq!(roadmap.phase_numbers(), vec![1, 2, 3, 4]);
        assert_eq!(roadmap.entry(3).unwrap().slug, "fix-blockers-iter-1");
    }

    #[test]
    fn test_created_phases_are_planned() {
        let (_dir, paths) = project("- [ ] **Phase 1: base**\n");
        let findings = parse_findings("1. [BLOCKER] **Broken build**\n");

        let created = synthesize(&paths, &findings, 2).created;

        assert_eq!(classify(&paths.phases_dir, created[0].number), PhaseStatus::Planned);
    }

    #[test]
    fn test_numbers_keep_increasing_across_iterations() {
        let (_dir, paths) = project("- [ ] **Phase 1: base**\n");
        let findings = parse_findings("1. [BLOCKER] **Broken build**\n");

        let first = synthesize(&paths, &findings, 1).created;
        let second = synthesize(&paths, &findings, 2).created;

        assert_eq!(first[0].number, 2);
        assert_eq!(second[0].number, 3);
    }

    #[test]
    fn test_empty_findings_create_nothing() {
        let (_dir, paths) = project("- [ ] **Phase 1: base**\n");
        let synthesis = synthesize(&paths, &Findings::default(), 1);
        assert!(synthesis.created.is_empty());
        assert!(synthesis.error.is_none());
        assert_eq!(Roadmap::load(&paths.roadmap).unwrap().phase_numbers(), vec![1]);
    }

    #[test]
    fn test_missing_roadmap_is_error() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        let findings = parse_findings("1. [BLOCKER] **x**\n");
        let synthesis = synthesize(&paths, &findings, 1);
        assert!(synthesis.created.is_empty());
        assert!(matches!(
            synthesis.error,
            Some(OrchestratorError::RoadmapReadFailed { .. })
        ));
    }

    #[test]
    fn test_failure_on_second_tier_keeps_first() {
        let (_dir, paths) = project("- [x] **Phase 1: base** — done\n");
        // A file where the high-tier phase directory would go
        fs::write(paths.phases_dir.join("03-fix-high-iter-1"), "in the way").unwrap();
        let findings = parse_findings("1. [BLOCKER] **Crash**\n2. [HIGH] **Leak**\n");

        let synthesis = synthesize(&paths, &findings, 1);

        assert_eq!(synthesis.numbers(), vec![2]);
        let err = synthesis.error.unwrap().to_string();
        assert!(err.contains("Failed to create phase directory"), "{}", err);
        let roadmap = Roadmap::load(&paths.roadmap).unwrap();
        assert_eq!(roadmap.phase_numbers(), vec![1, 2]);
        assert_eq!(classify(&paths.phases_dir, 2), PhaseStatus::Planned);
    }
}
