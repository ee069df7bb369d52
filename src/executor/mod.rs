//! Execution layer
//!
//! Script materialization and the sequential step runner.

mod runner;
mod scripts;

pub use runner::{JobRunner, RunnerConfig};
pub use scripts::{DriverFile, StepScript, VariablesFile};
