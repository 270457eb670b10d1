//! CLI command implementations.
//!
//! | Module    | Mode                         |
//! |-----------|------------------------------|
//! | `run`     | normal run                   |
//! | `dry_run` | `--dry-run`                  |

pub mod dry_run;
pub mod run;

pub use dry_run::cmd_dry_run;
pub use run::run_autopilot;
