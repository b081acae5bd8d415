//! remotest - run acceptance tests on a remote execution service
//!
//! Tests are described as plain steps and checks, submitted to the
//! service, and polled until done while live progress renders in the
//! terminal. Local target URLs are exposed through a tunnel first.

pub mod api;
pub mod case;
pub mod cli;
pub mod commands;
pub mod common;
pub mod render;
pub mod runner;
pub mod tunnel;

// Re-export the types most callers need
pub use api::{ApiClient, RunService};
pub use case::{SubmittedTest, TestCase, TestStep};
pub use common::config::Config;
pub use common::{Error, Result};
pub use render::{TestRenderer, TestStatus, TestViewer};
pub use runner::{RunResult, RunnerOptions, TestRunner};
pub use tunnel::{TunnelConnector, TunnelSession};
