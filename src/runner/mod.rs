//! Run orchestration: submission, polling, diffing, callback dispatch

pub mod runner;
pub mod snapshot;

pub use runner::{RunnerOptions, TestRunner};
pub use snapshot::RunResult;
