pub mod icons;
pub mod progress;

pub use progress::{AgentProgress, format_elapsed};
