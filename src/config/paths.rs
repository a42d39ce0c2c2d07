//! Platform paths for configuration and data.

use crate::error::ApiError;
use std::path::PathBuf;

/// `$XDG_CONFIG_HOME`, or `$HOME/.config` when unset.
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// Global config file: `$XDG_CONFIG_HOME/taxis/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    config_home().map(|home| home.join("taxis").join("config.toml"))
}

/// Default index location in the platform data directory.
pub fn default_database_path() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "taxis", "taxis").ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform data directory".to_string())
    })?;
    Ok(project_dirs.data_dir().join("index.sqlite3"))
}
