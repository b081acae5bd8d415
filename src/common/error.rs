//! Error types for the remotest client
//!
//! A run's outcome is broadcast to every waiter on a watch channel, so
//! `Error` stays `Clone` by stringifying wrapped sources.

use thiserror::Error;

use crate::api::types::Problem;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the remotest client
#[derive(Error, Debug, Clone)]
pub enum Error {
    // === Transport Errors ===
    #[error("API request failed: {0}")]
    Transport(String),

    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    // === Validation Errors ===
    #[error("Invalid test case: {0}")]
    Validation(String),

    #[error("Invalid test file '{path}': {message}")]
    SuiteParse { path: String, message: String },

    // === Fail-Fast Rejections ===
    #[error("Problem reported [{}] {} (expected: {}; got: {})",
        .0.severity, .0.title, .0.expected_result, .0.actual_result)]
    ProblemFailFast(Problem),

    #[error("Warning reported [{}] {} (expected: {}; got: {})",
        .0.severity, .0.title, .0.expected_result, .0.actual_result)]
    WarningFailFast(Problem),

    // === Tunnel Errors ===
    #[error("Tunnel connection failed: {0}")]
    Tunnel(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API key not set. Set {} or add `key` under [api] in {}",
        super::config::API_KEY_ENV, super::config::CONFIG_FILE)]
    MissingApiKey,

    // === Run Outcomes ===
    #[error("{failed} of {total} tests failed")]
    TestsFailed { failed: usize, total: usize },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error ended a run because of a fail-fast policy
    pub fn is_fail_fast(&self) -> bool {
        matches!(self, Self::ProblemFailFast(_) | Self::WarningFailFast(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
