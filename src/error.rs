//! Error types for the index, the tag codec, and the command layer.

use crate::types::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the SQLite-backed index.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The parent chain of a node cannot be walked to a root.
    #[error("Corrupt index tree at node {node}: {reason}")]
    CorruptTree { node: NodeId, reason: String },
}

/// Failures raised while reading or decoding a tag blob.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed tag data at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("Tag data is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors surfaced to callers of the index operations and the CLI.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Cannot read tags of {path:?}: {source}")]
    CodecError {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Path cannot be indexed: {0:?}")]
    InvalidPath(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("{0}")]
    Usage(String),
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::StorageError(StorageError::SqliteError(err))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<notify::Error> for ApiError {
    fn from(err: notify::Error) -> Self {
        ApiError::WatchError(err.to_string())
    }
}
