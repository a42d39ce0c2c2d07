//! Configuration: layered `config` sources deserialized into [`TaxisConfig`].
//!
//! Precedence, lowest first: built-in defaults, the global file
//! (`$XDG_CONFIG_HOME/taxis/config.toml`), an explicit `--config` file, then
//! `TAXIS__<SECTION>__<KEY>` environment variables. CLI flags are applied on
//! top by the caller.

mod merge;
pub mod paths;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tree::ignore::IgnoreRules;
use crate::watch::MonitorConfig;
use config::ConfigError;
use merge::MergeService;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Index database file; None means the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_commit_wait_secs")]
    pub commit_wait_secs: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_rename_window_ms")]
    pub rename_window_ms: u64,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_commit_wait_secs() -> u64 {
    5
}

fn default_tick_secs() -> u64 {
    5
}

fn default_rename_window_ms() -> u64 {
    500
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            commit_wait_secs: default_commit_wait_secs(),
            tick_secs: default_tick_secs(),
            rename_window_ms: default_rename_window_ms(),
            ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_page_size() -> usize {
    crate::query::DEFAULT_PAGE_SIZE
}

fn default_limit() -> usize {
    1000
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            default_limit: default_limit(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxisConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TaxisConfig {
    /// Database file to open: the configured path or the platform default.
    pub fn database_path(&self) -> Result<PathBuf, ApiError> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => paths::default_database_path(),
        }
    }

    /// Monitor settings for `directories`. The database file and its
    /// journal siblings are always ignored.
    pub fn monitor_config(
        &self,
        directories: Vec<PathBuf>,
        scan: bool,
        database: &Path,
    ) -> MonitorConfig {
        MonitorConfig {
            directories,
            scan,
            commit_wait: Duration::from_secs(self.monitor.commit_wait_secs),
            tick: Duration::from_secs(self.monitor.tick_secs.max(1)),
            rename_window: Duration::from_millis(self.monitor.rename_window_ms),
            ignore: IgnoreRules::new(self.monitor.ignore_patterns.clone()).with_prefix(database),
        }
    }
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, `explicit` and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<TaxisConfig, ConfigError> {
        MergeService::load(explicit)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<TaxisConfig, ConfigError> {
        MergeService::load_from_file(path)
    }
}
