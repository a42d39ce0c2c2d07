//! Tag inverted index: the `tags` relation kept in step with `files.tags`.

use super::tree::IndexWriter;
use crate::codec::TagCodec;
use crate::error::StorageError;
use crate::types::{NodeId, TagMap};
use rusqlite::params;
use tracing::trace;

impl IndexWriter<'_> {
    /// Insert one row per (key, value) pair of `tags`.
    pub fn insert_tags(
        &self,
        id: NodeId,
        tags: &TagMap,
        codec: &dyn TagCodec,
    ) -> Result<(), StorageError> {
        let mut stmt = self
            .conn()
            .prepare_cached("INSERT INTO tags (tag, file) VALUES (?1, ?2)")?;
        for (key, values) in tags {
            for value in values {
                stmt.execute(params![codec.encode_single(key, value.as_deref()), id])?;
            }
        }
        Ok(())
    }

    /// Delete every tag entry of a node.
    pub fn remove_all_tags(&self, id: NodeId) -> Result<usize, StorageError> {
        Ok(self
            .conn()
            .prepare_cached("DELETE FROM tags WHERE file = ?1")?
            .execute(params![id])?)
    }

    /// Bring a node's blob and tag entries to `new`.
    ///
    /// Writes nothing when `old` already equals `new` and returns whether a
    /// write happened.
    pub fn replace_tags(
        &self,
        id: NodeId,
        old: Option<&TagMap>,
        new: &TagMap,
        codec: &dyn TagCodec,
    ) -> Result<bool, StorageError> {
        if old == Some(new) {
            return Ok(false);
        }
        let removed = self.remove_all_tags(id)?;
        self.set_tags(id, Some(codec.encode(new).as_str()))?;
        self.insert_tags(id, new, codec)?;
        trace!(id, removed, "Replaced tag entries");
        Ok(true)
    }
}
