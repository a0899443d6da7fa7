//! Scenario runner for the histogram filter: YAML in, one JSON line per filter step out.

pub mod config;
pub mod logging;
pub mod runner;
