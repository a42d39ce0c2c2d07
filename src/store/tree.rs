//! Tree-mirror operations over the `files` table.

use super::cache::PathCache;
use super::NodeRow;
use crate::error::StorageError;
use crate::types::NodeId;
use rusqlite::{params, Connection, OptionalExtension, Row, Savepoint};
use tracing::trace;

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        parent: row.get(1)?,
        segment: row.get(2)?,
        tags: row.get(3)?,
    })
}

pub(super) fn resolve_child(
    conn: &Connection,
    parent: Option<NodeId>,
    segment: &str,
) -> Result<Option<NodeId>, StorageError> {
    Ok(conn
        .prepare_cached("SELECT id FROM files WHERE parent IS ?1 AND segment = ?2 LIMIT 1")?
        .query_row(params![parent, segment], |row| row.get(0))
        .optional()?)
}

pub(super) fn resolve_path<S: AsRef<str>>(
    conn: &Connection,
    segments: &[S],
) -> Result<Option<NodeId>, StorageError> {
    let mut current = None;
    for segment in segments {
        match resolve_child(conn, current, segment.as_ref())? {
            Some(id) => current = Some(id),
            None => return Ok(None),
        }
    }
    Ok(current)
}

pub(super) fn node(conn: &Connection, id: NodeId) -> Result<Option<NodeRow>, StorageError> {
    Ok(conn
        .prepare_cached("SELECT id, parent, segment, tags FROM files WHERE id = ?1")?
        .query_row(params![id], node_from_row)
        .optional()?)
}

pub(super) fn children(
    conn: &Connection,
    parent: Option<NodeId>,
) -> Result<Vec<NodeRow>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, parent, segment, tags FROM files WHERE parent IS ?1 ORDER BY segment",
    )?;
    let rows = stmt
        .query_map(params![parent], node_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn child_count(conn: &Connection, id: NodeId) -> Result<i64, StorageError> {
    Ok(conn
        .prepare_cached("SELECT count(1) FROM files WHERE parent = ?1")?
        .query_row(params![id], |row| row.get(0))?)
}

/// Mutation scope over the index.
///
/// Wraps a savepoint: dropping the writer without [`IndexWriter::commit`]
/// rolls every change back, so a failed path update never leaves a node and
/// its tag entries out of step. Every mutating method invalidates the path
/// cache.
pub struct IndexWriter<'a> {
    tx: Savepoint<'a>,
    paths: &'a PathCache,
}

impl<'a> IndexWriter<'a> {
    pub(super) fn new(tx: Savepoint<'a>, paths: &'a PathCache) -> Result<Self, StorageError> {
        Ok(Self { tx, paths })
    }

    pub(super) fn conn(&self) -> &Connection {
        &self.tx
    }

    pub(super) fn invalidate(&self) {
        self.paths.invalidate();
    }

    /// Keep the changes. Inside an outer batch they become durable when the
    /// batch commits.
    pub fn commit(self) -> Result<(), StorageError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn resolve_child(
        &self,
        parent: Option<NodeId>,
        segment: &str,
    ) -> Result<Option<NodeId>, StorageError> {
        resolve_child(&self.tx, parent, segment)
    }

    pub fn resolve_path<S: AsRef<str>>(
        &self,
        segments: &[S],
    ) -> Result<Option<NodeId>, StorageError> {
        resolve_path(&self.tx, segments)
    }

    pub fn node(&self, id: NodeId) -> Result<Option<NodeRow>, StorageError> {
        node(&self.tx, id)
    }

    pub fn children(&self, parent: Option<NodeId>) -> Result<Vec<NodeRow>, StorageError> {
        children(&self.tx, parent)
    }

    /// Walk `segments` from the root, creating missing nodes.
    ///
    /// Only a node created for the last segment receives `leaf_tags`; existing
    /// nodes are reused untouched, so repeating the call is a no-op. Returns
    /// `None` for an empty segment list.
    pub fn ensure_path<S: AsRef<str>>(
        &self,
        segments: &[S],
        leaf_tags: Option<&str>,
    ) -> Result<Option<NodeId>, StorageError> {
        let mut current = None;
        let last = segments.len().saturating_sub(1);
        for (index, segment) in segments.iter().enumerate() {
            let segment = segment.as_ref();
            let id = match resolve_child(&self.tx, current, segment)? {
                Some(id) => id,
                None => {
                    let tags = if index == last { leaf_tags } else { None };
                    self.tx
                        .prepare_cached(
                            "INSERT INTO files (parent, segment, tags) VALUES (?1, ?2, ?3)",
                        )?
                        .execute(params![current, segment, tags])?;
                    let id = self.tx.last_insert_rowid();
                    trace!(id, parent = ?current, segment, "Created node");
                    self.invalidate();
                    id
                }
            };
            current = Some(id);
        }
        Ok(current)
    }

    /// Overwrite the tag blob of a node.
    pub fn set_tags(&self, id: NodeId, tags: Option<&str>) -> Result<(), StorageError> {
        self.tx
            .prepare_cached("UPDATE files SET tags = ?1 WHERE id = ?2")?
            .execute(params![tags, id])?;
        Ok(())
    }

    /// Move a node under a new parent and name, keeping its id and tags.
    pub fn reparent(
        &self,
        id: NodeId,
        new_parent: Option<NodeId>,
        new_segment: &str,
    ) -> Result<(), StorageError> {
        self.tx
            .prepare_cached("UPDATE files SET parent = ?1, segment = ?2 WHERE id = ?3")?
            .execute(params![new_parent, new_segment, id])?;
        self.invalidate();
        Ok(())
    }

    /// Remove a node, then every ancestor left without children.
    ///
    /// Tag entries of the node must already be gone (see
    /// [`IndexWriter::remove_all_tags`]). Removing an id that no longer
    /// exists is a no-op.
    pub fn delete_leaf(&self, id: NodeId) -> Result<(), StorageError> {
        let Some(row) = node(&self.tx, id)? else {
            return Ok(());
        };
        self.tx
            .prepare_cached("DELETE FROM files WHERE id = ?1")?
            .execute(params![id])?;
        trace!(id, segment = %row.segment, "Deleted node");
        self.invalidate();
        self.prune_upward(row.parent)
    }

    /// Delete structural nodes upward from `start` while they have no
    /// children. Stops at the first node with a child or with tags.
    pub fn prune_upward(&self, start: Option<NodeId>) -> Result<(), StorageError> {
        let mut current = start;
        let mut steps = 0;
        while let Some(id) = current {
            steps += 1;
            if steps > super::MAX_PATH_DEPTH {
                return Err(StorageError::CorruptTree {
                    node: id,
                    reason: "parent chain does not reach a root".to_string(),
                });
            }
            if child_count(&self.tx, id)? > 0 {
                break;
            }
            let Some(row) = node(&self.tx, id)? else {
                break;
            };
            if row.tags.is_some() {
                break;
            }
            self.tx
                .prepare_cached("DELETE FROM files WHERE id = ?1")?
                .execute(params![id])?;
            trace!(id, segment = %row.segment, "Pruned empty node");
            current = row.parent;
        }
        self.invalidate();
        Ok(())
    }

    /// Delete a node with all of its descendants and their tag entries, then
    /// prune upward. Returns the number of removed nodes.
    pub fn delete_subtree(&self, id: NodeId) -> Result<usize, StorageError> {
        let Some(row) = node(&self.tx, id)? else {
            return Ok(0);
        };
        const SUBTREE: &str = "WITH RECURSIVE sub(id) AS (
                SELECT ?1
                UNION
                SELECT files.id FROM files JOIN sub ON files.parent = sub.id
            )";
        self.tx.execute(
            &format!("{SUBTREE} DELETE FROM tags WHERE file IN (SELECT id FROM sub)"),
            params![id],
        )?;
        let removed = self.tx.execute(
            &format!("{SUBTREE} DELETE FROM files WHERE id IN (SELECT id FROM sub)"),
            params![id],
        )?;
        trace!(id, segment = %row.segment, removed, "Deleted subtree");
        self.invalidate();
        self.prune_upward(row.parent)?;
        Ok(removed)
    }
}
