//! Configuration file handling
//!
//! Settings come from `remotest.toml`, found by walking up from the
//! working directory. Every field has a default so the file is optional;
//! the API key may also come from the environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Error, Result};

/// Environment variable that overrides `[api] key`
pub const API_KEY_ENV: &str = "REMOTEST_API_KEY";

/// File name searched for during config discovery
pub const CONFIG_FILE: &str = "remotest.toml";

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Execution API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Reverse tunnel settings
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Run orchestration settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Terminal rendering settings
    #[serde(default)]
    pub render: RenderConfig,
}

/// Execution API settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the execution API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; the REMOTEST_API_KEY environment variable takes precedence
    pub key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.remotest.dev/api".to_string()
}
fn default_timeout() -> u64 {
    30
}

/// Reverse tunnel settings
#[derive(Debug, Deserialize, Clone)]
pub struct TunnelConfig {
    /// Expose local target URLs through a tunnel before submission
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tunnel control endpoint
    #[serde(default = "default_tunnel_url")]
    pub server_url: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: default_tunnel_url(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tunnel_url() -> String {
    "https://tunnel.remotest.dev".to_string()
}

/// Run orchestration settings
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Delay between status polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Reject a run on its first reported problem
    #[serde(default)]
    pub fail_fast_on_problem: bool,

    /// Reject a run on its first reported warning
    #[serde(default)]
    pub fail_fast_on_warning: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            fail_fast_on_problem: false,
            fail_fast_on_warning: false,
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

/// Terminal rendering settings
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// Animation tick period in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

fn default_tick_interval() -> u64 {
    100
}

impl Config {
    /// Load configuration starting from the working directory
    ///
    /// Returns default configuration if no config file exists
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot determine working directory: {e}")))?;
        Self::load_from(&cwd)
    }

    /// Load configuration by walking up from `start` to the filesystem root
    pub fn load_from(start: &Path) -> Result<Self> {
        if let Some(path) = find_config(start) {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read '{}': {}", path.display(), e))
            })?;
            return toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid '{}': {}", path.display(), e)));
        }
        Ok(Self::default())
    }

    /// Resolve the API key from the environment or the config file
    pub fn api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        match &self.api.key {
            Some(key) if !key.is_empty() => Ok(key.clone()),
            _ => Err(Error::MissingApiKey),
        }
    }

    /// Request timeout as a `Duration`
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Poll delay as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.runner.poll_interval_ms)
    }

    /// Animation tick period as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.render.tick_interval_ms)
    }
}

fn find_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}
