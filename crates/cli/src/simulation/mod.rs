//! Scenario execution.

mod runner;
mod stats;

pub use runner::Simulation;
pub use stats::SimulationStats;
