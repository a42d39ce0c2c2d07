//! MergeService: orchestrates sources and deserializes to TaxisConfig.

use super::paths;
use super::TaxisConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = TaxisConfig::default();
    Config::builder()
        .set_default("monitor.commit_wait_secs", defaults.monitor.commit_wait_secs)?
        .set_default("monitor.tick_secs", defaults.monitor.tick_secs)?
        .set_default("query.page_size", defaults.query.page_size as u64)?
        .set_default("query.default_limit", defaults.query.default_limit as u64)?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("logging.output", defaults.logging.output)
}

fn with_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("TAXIS")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("monitor.ignore_patterns"),
    )
}

impl MergeService {
    /// Precedence: global file (lowest) -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<TaxisConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;
        if let Some(global) = paths::global_config_path() {
            builder = builder.add_source(
                File::from(global)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        with_environment(builder).build()?.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<TaxisConfig, ConfigError> {
        let builder =
            builder_with_defaults()?.add_source(File::from(path).format(FileFormat::Toml));
        with_environment(builder).build()?.try_deserialize()
    }
}
