//! CLI Tooling
//!
//! Command-line interface for the tag index: the monitor daemon, queries,
//! reverse lookups and status.

use super::format::{format_inspect_text, format_status_text, InspectReport, StatusReport};
use crate::codec::{PolytaxisCodec, TagCodec};
use crate::config::{ConfigLoader, TaxisConfig};
use crate::error::ApiError;
use crate::indexer::Indexer;
use crate::logging::LoggingConfig;
use crate::query::{parse_query, row_passes, sort_rows, FileRow, QueryEngine, TagSearch};
use crate::store::IndexStore;
use crate::tree::path::{absolutize, split_abs_path};
use crate::types::NodeId;
use crate::watch::MonitorDaemon;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Taxis CLI - Filesystem tag index
#[derive(Parser, Debug)]
#[command(name = "taxis")]
#[command(about = "Index file tags and query files by tag")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Index database path (overrides configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch directories and keep the index current
    Monitor {
        /// Directories to watch recursively
        #[arg(required = true)]
        directories: Vec<PathBuf>,
        /// Remove vanished files and rescan the directories before watching
        #[arg(short, long)]
        scan: bool,
    },
    /// Query files (or tags) in the index
    Query {
        /// Query tokens: tag, ^tag, key<value, col:key, sort+:key, ...
        tokens: Vec<String>,
        /// Limit number of results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Separate results with NUL (0x00) rather than newlines
        #[arg(short = '0', long)]
        print0: bool,
        /// Display requested columns rather than file paths
        #[arg(short, long)]
        columns: bool,
        /// Query tags rather than files
        #[arg(short, long, value_enum, num_args = 0..=1, default_missing_value = "prefix")]
        tags: Option<TagSearch>,
    },
    /// Print the path of a node id
    Path {
        id: NodeId,
    },
    /// Show the id and tags of an indexed file
    Inspect {
        path: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show index statistics
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Result of one command: text for stdout, an optional notice for stderr
/// and the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: Option<String>,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(stdout: String) -> Self {
        Self {
            stdout,
            stderr: None,
            exit_code: 0,
        }
    }

    fn miss(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: Some(message),
            exit_code: 1,
        }
    }
}

/// Logging settings after applying CLI flags over the `[logging]` section.
pub fn logging_config(cli: &Cli, config: &TaxisConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
    logging
}

/// CLI context holding resolved configuration
pub struct CliContext {
    config: TaxisConfig,
    database: PathBuf,
}

impl CliContext {
    /// Load configuration and resolve the database path for `cli`.
    pub fn load(cli: &Cli) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(cli.config.as_deref()).map_err(|e| {
            ApiError::ConfigError(format!("Failed to load config: {}", e))
        })?;
        let database = match &cli.database {
            Some(path) => path.clone(),
            None => config.database_path()?,
        };
        Ok(Self::new(config, database))
    }

    pub fn new(config: TaxisConfig, database: PathBuf) -> Self {
        Self { config, database }
    }

    pub fn config(&self) -> &TaxisConfig {
        &self.config
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    fn open_store(&self) -> Result<IndexStore, ApiError> {
        Ok(IndexStore::open(&self.database)?)
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Monitor { directories, scan } => self.monitor(directories, *scan),
            Commands::Query {
                tokens,
                limit,
                print0,
                columns,
                tags,
            } => {
                let limit = limit.unwrap_or(self.config.query.default_limit);
                let separator = if *print0 { '\0' } else { '\n' };
                let (stdout, count) = match tags {
                    Some(search) => self.query_tags(*search, tokens, limit, separator)?,
                    None => self.query_files(tokens, limit, *columns, separator)?,
                };
                let stderr = (!*print0 && limit > 0 && count == limit)
                    .then(|| format!("Stopped at {} results.", limit));
                Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code: 0,
                })
            }
            Commands::Path { id } => {
                let store = self.open_store()?;
                if store.node(*id)?.is_none() {
                    return Ok(CommandOutput::miss(format!("No node with id {}", id)));
                }
                let path = store.reconstruct_path(*id)?;
                Ok(CommandOutput::ok(format!("{}\n", path)))
            }
            Commands::Inspect { path, format } => self.inspect(path, format),
            Commands::Status { format } => {
                let store = self.open_store()?;
                let stats = store.stats()?;
                let text = match format.as_str() {
                    "json" => {
                        let report = StatusReport {
                            database: &self.database,
                            stats: &stats,
                        };
                        let mut text = serde_json::to_string_pretty(&report)
                            .map_err(|e| ApiError::Usage(e.to_string()))?;
                        text.push('\n');
                        text
                    }
                    _ => format_status_text(&self.database, &stats),
                };
                Ok(CommandOutput::ok(text))
            }
        }
    }

    fn monitor(&self, directories: &[PathBuf], scan: bool) -> Result<CommandOutput, ApiError> {
        let mut absolute = Vec::with_capacity(directories.len());
        for directory in directories {
            if !directory.is_dir() {
                return Err(ApiError::InvalidPath(directory.clone()));
            }
            absolute.push(absolutize(directory).map_err(crate::error::StorageError::from)?);
        }
        let database = absolutize(&self.database).map_err(crate::error::StorageError::from)?;
        let store = self.open_store()?;
        let monitor = self.config.monitor_config(absolute, scan, &database);
        let daemon = MonitorDaemon::new(Indexer::new(store), monitor);
        daemon
            .handle()
            .stop_on_ctrl_c()
            .map_err(|e| ApiError::WatchError(format!("Failed to install interrupt handler: {}", e)))?;

        info!(database = %database.display(), "Starting monitor");
        let summary = daemon.run()?;
        Ok(CommandOutput::ok(format!(
            "Monitor stopped: {} events, {} failures, {} commits\n",
            summary.events, summary.failures, summary.commits
        )))
    }

    fn query_tags(
        &self,
        search: TagSearch,
        tokens: &[String],
        limit: usize,
        separator: char,
    ) -> Result<(String, usize), ApiError> {
        if tokens.len() > 1 {
            return Err(ApiError::Usage(
                "When querying tags you may specify at most one query argument.".to_string(),
            ));
        }
        let store = self.open_store()?;
        let engine = QueryEngine::new(&store).with_page_size(self.config.query.page_size);
        let arg = tokens.first().map(String::as_str).unwrap_or("");
        let mut out = String::new();
        let mut count = 0;
        for tag in engine.tags(search, arg).take(limit) {
            out.push_str(&tag?);
            out.push(separator);
            count += 1;
        }
        Ok((out, count))
    }

    fn query_files(
        &self,
        tokens: &[String],
        limit: usize,
        columns: bool,
        separator: char,
    ) -> Result<(String, usize), ApiError> {
        let query = parse_query(tokens);
        let store = self.open_store()?;
        let engine = QueryEngine::new(&store).with_page_size(self.config.query.page_size);

        let matches = engine.files(&query).filter(|row| match row {
            Ok(row) => row_passes(&query.filters, row),
            Err(_) => true,
        });
        let rows: Vec<FileRow> = if query.sort.is_empty() {
            matches.take(limit).collect::<Result<_, _>>()?
        } else {
            let all: Vec<FileRow> = matches.collect::<Result<_, _>>()?;
            let mut sorted = sort_rows(&query.sort, all);
            sorted.truncate(limit);
            sorted
        };

        let mut out = String::new();
        for row in &rows {
            if columns {
                let line: Vec<String> = query.columns.iter().map(|c| row.column(c)).collect();
                out.push_str(&line.join("\t"));
            } else {
                out.push_str(&engine.path(row.id)?);
            }
            out.push(separator);
        }
        Ok((out, rows.len()))
    }

    fn inspect(&self, path: &Path, format: &str) -> Result<CommandOutput, ApiError> {
        let store = self.open_store()?;
        let absolute = absolutize(path).map_err(crate::error::StorageError::from)?;
        let text = absolute
            .to_str()
            .ok_or_else(|| ApiError::InvalidPath(absolute.clone()))?;
        let segments = split_abs_path(text);
        let node = match store.resolve_path(&segments)? {
            Some(id) => store.node(id)?,
            None => None,
        };
        let Some((id, blob)) = node.and_then(|n| n.tags.map(|tags| (n.id, tags))) else {
            return Ok(CommandOutput::miss(format!("Not indexed: {}", absolute.display())));
        };
        let tags = PolytaxisCodec
            .decode(&blob)
            .map_err(|source| ApiError::CodecError {
                path: absolute.clone(),
                source,
            })?;
        let path = store.reconstruct_path(id)?;
        let report = InspectReport {
            id,
            path: &path,
            tags: &tags,
        };
        let text = match format {
            "json" => {
                let mut text = serde_json::to_string_pretty(&report)
                    .map_err(|e| ApiError::Usage(e.to_string()))?;
                text.push('\n');
                text
            }
            _ => format_inspect_text(&report),
        };
        Ok(CommandOutput::ok(text))
    }
}
