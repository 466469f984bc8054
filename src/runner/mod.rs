//! Per-case orchestration and the experiment matrix

pub mod case_runner;
pub mod experiment;
pub mod key;
pub mod task;

pub use case_runner::{CaseFailure, CaseRunner, PassReport, RunnerConfig};
pub use experiment::{Experiment, ExperimentReport};
pub use key::{InvocationConfig, ResultKey};
pub use task::Task;
