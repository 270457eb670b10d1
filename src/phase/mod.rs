//! Phases: roadmap entries, on-disk status, and preparation pipelines.
//!
//! A phase is identified by its number. Nothing here caches state; the roadmap and the
//! phase directories are re-read on every query.

pub mod pipeline;
pub mod roadmap;
pub mod status;

pub use pipeline::{PrepStep, build_steps};
pub use roadmap::{NewRoadmapEntry, Roadmap, RoadmapEntry, append_entry};
pub use status::{PhaseState, PhaseStatus, classify, classify_phase, find_phase_dir, phase_prefix};
