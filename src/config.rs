use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{tlog_debug, Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on nodes kept from a decomposition; surplus is dropped.
    pub max_nodes: usize,
    /// Extra attempts granted to a node that does not specify its own.
    pub default_max_retries: u32,
    /// Hard ceiling on per-node extra attempts.
    pub retry_cap: u32,
    /// Dependency output is truncated to this many characters in prompts.
    pub context_truncate_chars: usize,
    /// Default wait for a protocol request before it times out.
    pub request_timeout_ms: u64,
    /// Bound on the number of live flow entries the router retains.
    pub flow_capacity: usize,
    /// Override for the agent runner binary.
    pub runner_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_nodes: 8,
            default_max_retries: 1,
            retry_cap: 2,
            context_truncate_chars: 500,
            request_timeout_ms: 10_000,
            flow_capacity: 1024,
            runner_command: None,
        }
    }
}

impl Config {
    pub fn troupe_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".troupe"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::troupe_dir()?.join("troupe.toml"))
    }

    /// Agent CLI used when `runner_command` is unset.
    pub const DEFAULT_RUNNER_COMMAND: &'static str = "claude";

    pub fn effective_runner_command(&self) -> &str {
        self.runner_command
            .as_deref()
            .unwrap_or(Self::DEFAULT_RUNNER_COMMAND)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        tlog_debug!(
            "Config loaded: max_nodes={}, retry_cap={}, flow_capacity={}",
            config.max_nodes,
            config.retry_cap,
            config.flow_capacity
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let troupe_dir = Self::troupe_dir()?;
        tlog_debug!("Config::save troupe_dir={}", troupe_dir.display());
        if !troupe_dir.exists() {
            tlog_debug!("Creating troupe directory");
            fs::create_dir_all(&troupe_dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        tlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let troupe_dir = Self::troupe_dir()?;
        tlog_debug!("Config::ensure_dirs troupe={}", troupe_dir.display());
        if !troupe_dir.exists() {
            fs::create_dir_all(&troupe_dir)?;
        }
        Ok(())
    }
}
