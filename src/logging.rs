//! Tracing setup for the autopilot binary.
//!
//! Two sinks share one filter policy:
//!
//! - **stderr**: compact, human-oriented, interleaves with the progress spinners.
//! - **file**: `.planning/autopilot/logs/autopilot.log`, no ANSI, kept across runs.
//!
//! The per-invocation agent captures (`logs/<label>.log`) are product output of the
//! watchdog and are unaffected by `RUST_LOG`.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the tracing log file inside the log directory.
pub const LOG_FILE: &str = "autopilot.log";

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "autopilot=debug" } else { "autopilot=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `verbose`. When `log_dir` is given a file layer is added and
/// the returned guard must be held until exit so buffered lines are flushed.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter(verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .with_filter(filter(verbose));

    // A second init (e.g. from tests sharing a process) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}
