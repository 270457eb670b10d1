pub mod agent;
pub mod autopilot_config;
pub mod config;
pub mod errors;
pub mod improve;
pub mod logging;
pub mod orchestrator;
pub mod phase;
pub mod project;
pub mod report;
pub mod review;
pub mod ui;

#[cfg(test)]
mod test_support;
