//! CLI command definitions
//!
//! Defines the clap commands for the remotest CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run test suites against the remote execution service
    Run {
        /// Test files or directories to search for them (default: current directory)
        paths: Vec<PathBuf>,

        /// How many tests to run at the same time
        #[arg(long, short = 'w', default_value_t = 1)]
        workers: usize,

        /// Fail a test on the first reported problem instead of waiting
        /// for the run to finish
        #[arg(long)]
        fail_fast: bool,
    },

    /// Check test files for mistakes without submitting anything
    Validate {
        /// Test files or directories to search for them (default: current directory)
        paths: Vec<PathBuf>,
    },
}
