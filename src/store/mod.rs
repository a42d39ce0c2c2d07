//! Index Store
//!
//! SQLite-backed storage session holding the mirrored tree (`files`) and the
//! tag inverted index (`tags`). Readers use [`IndexStore`] directly; all
//! mutations go through an [`IndexWriter`], which scopes them to a savepoint.

pub mod cache;
mod tags;
mod tree;

pub use cache::{PathCache, PathLink};
pub use tree::IndexWriter;

use crate::error::StorageError;
use crate::tree::path::join_segments;
use crate::types::NodeId;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Longest parent chain a path reconstruction will follow.
pub const MAX_PATH_DEPTH: usize = 4096;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER,
    segment TEXT NOT NULL,
    tags TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS files_parent_segment ON files (parent, segment);
CREATE TABLE IF NOT EXISTS tags (
    tag TEXT NOT NULL,
    file INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS tags_tag ON tags (tag);
CREATE INDEX IF NOT EXISTS tags_file ON tags (file);
";

/// Node row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub segment: String,
    pub tags: Option<String>,
}

/// Counts reported by `taxis status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub nodes: u64,
    pub files: u64,
    pub tag_entries: u64,
    pub distinct_tags: u64,
}

/// Storage session over one SQLite database.
pub struct IndexStore {
    conn: Connection,
    paths: PathCache,
}

impl IndexStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened index database");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            paths: PathCache::default(),
        })
    }

    /// Replace the path cache, e.g. to change its capacity.
    pub fn with_path_cache(mut self, paths: PathCache) -> Self {
        self.paths = paths;
        self
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path_cache(&self) -> &PathCache {
        &self.paths
    }

    /// Start a mutation scope. Nothing is kept unless [`IndexWriter::commit`]
    /// is called.
    pub fn write(&mut self) -> Result<IndexWriter<'_>, StorageError> {
        IndexWriter::new(self.conn.savepoint()?, &self.paths)
    }

    /// Open an outer transaction that collects writers until
    /// [`IndexStore::commit_batch`]. No-op when one is already open.
    pub fn begin_batch(&self) -> Result<(), StorageError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Durably commit the outer transaction. Returns whether one was open.
    pub fn commit_batch(&self) -> Result<bool, StorageError> {
        if self.conn.is_autocommit() {
            return Ok(false);
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(true)
    }

    pub fn in_batch(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Drop cached parent links; call when another process may have written.
    pub fn invalidate_paths(&self) {
        self.paths.invalidate();
    }

    pub fn resolve_child(
        &self,
        parent: Option<NodeId>,
        segment: &str,
    ) -> Result<Option<NodeId>, StorageError> {
        tree::resolve_child(&self.conn, parent, segment)
    }

    pub fn resolve_path<S: AsRef<str>>(
        &self,
        segments: &[S],
    ) -> Result<Option<NodeId>, StorageError> {
        tree::resolve_path(&self.conn, segments)
    }

    pub fn node(&self, id: NodeId) -> Result<Option<NodeRow>, StorageError> {
        tree::node(&self.conn, id)
    }

    pub fn children(&self, parent: Option<NodeId>) -> Result<Vec<NodeRow>, StorageError> {
        tree::children(&self.conn, parent)
    }

    /// Rebuild the absolute path of a node by walking its parent chain.
    pub fn reconstruct_path(&self, id: NodeId) -> Result<String, StorageError> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if segments.len() >= MAX_PATH_DEPTH {
                return Err(StorageError::CorruptTree {
                    node: id,
                    reason: format!("parent chain exceeds {} links", MAX_PATH_DEPTH),
                });
            }
            let link = match self.paths.get(node) {
                Some(link) => link,
                None => {
                    let link = self
                        .conn
                        .query_row(
                            "SELECT parent, segment FROM files WHERE id = ?1",
                            params![node],
                            |row| {
                                Ok(PathLink {
                                    parent: row.get(0)?,
                                    segment: row.get(1)?,
                                })
                            },
                        )
                        .optional()?
                        .ok_or_else(|| StorageError::CorruptTree {
                            node: id,
                            reason: format!("missing ancestor {}", node),
                        })?;
                    self.paths.insert(node, link.clone());
                    link
                }
            };
            current = link.parent;
            segments.push(link.segment);
        }
        segments.reverse();
        Ok(join_segments(&segments))
    }

    pub fn stats(&self) -> Result<IndexStats, StorageError> {
        let count = |sql: &str| -> Result<u64, StorageError> {
            let value: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(value as u64)
        };
        Ok(IndexStats {
            nodes: count("SELECT count(*) FROM files")?,
            files: count("SELECT count(*) FROM files WHERE tags IS NOT NULL")?,
            tag_entries: count("SELECT count(*) FROM tags")?,
            distinct_tags: count("SELECT count(DISTINCT tag) FROM tags")?,
        })
    }
}
