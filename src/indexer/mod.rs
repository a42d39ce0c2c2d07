//! Incremental Update Protocol
//!
//! Applies filesystem observations to the index. Every observation of a path
//! is reduced to two facts, whether the index holds it and whether it is a
//! regular file on disk, and the pair decides the action:
//!
//! | in index | on disk | action |
//! |----------|---------|--------|
//! | no       | no      | nothing |
//! | no       | yes     | create the node chain and its tag entries |
//! | yes      | yes     | replace tags when they changed |
//! | yes      | no      | drop tag entries, delete the node, prune ancestors |
//!
//! Moves relocate the existing node so its id survives. Each path is applied
//! in its own savepoint; a failure rolls back that path only.

pub mod commit;

pub use commit::CommitDebouncer;

use crate::codec::{PolytaxisCodec, TagCodec};
use crate::error::{ApiError, StorageError};
use crate::store::{IndexStore, IndexWriter, NodeRow};
use crate::tree::ignore::IgnoreRules;
use crate::tree::path::{absolutize, join_segments, split_abs_path};
use crate::types::{untagged, NodeId, TagMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Filesystem change event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// What an observation did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    /// Neither indexed nor a file: nothing to do.
    Skipped,
    Created(NodeId),
    Updated(NodeId),
    Unchanged(NodeId),
    Deleted(NodeId),
    Moved(NodeId),
    /// A directory new to the index was walked and its files indexed.
    Scanned { indexed: usize, failed: usize },
}

/// Counts from a directory walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ScanReport {
    fn record(&mut self, action: PathAction) {
        self.scanned += 1;
        match action {
            PathAction::Created(_) => self.created += 1,
            PathAction::Updated(_) | PathAction::Moved(_) | PathAction::Deleted(_) => {
                self.updated += 1
            }
            PathAction::Unchanged(_) | PathAction::Skipped => self.unchanged += 1,
            PathAction::Scanned { indexed, failed } => {
                self.created += indexed;
                self.failed += failed;
            }
        }
    }
}

/// Counts from the startup repair traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub checked: usize,
    pub removed: usize,
    pub failed: usize,
}

enum DiskState {
    Absent,
    Directory,
    File(TagMap),
}

/// Single writer over an index: owns the storage session and the codec.
pub struct Indexer<C: TagCodec = PolytaxisCodec> {
    store: IndexStore,
    codec: C,
    ignore: IgnoreRules,
}

impl Indexer<PolytaxisCodec> {
    pub fn new(store: IndexStore) -> Self {
        Self::with_codec(store, PolytaxisCodec)
    }
}

impl<C: TagCodec> Indexer<C> {
    pub fn with_codec(store: IndexStore, codec: C) -> Self {
        Self {
            store,
            codec,
            ignore: IgnoreRules::default(),
        }
    }

    /// Paths matching `ignore` are skipped by directory scans.
    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut IndexStore {
        &mut self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    pub fn into_store(self) -> IndexStore {
        self.store
    }

    /// Route one filesystem event to the state machine.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> Result<PathAction, ApiError> {
        match event {
            ChangeEvent::Created(path) | ChangeEvent::Modified(path) | ChangeEvent::Removed(path) => {
                self.process_path(path)
            }
            ChangeEvent::Renamed { from, to } => self.move_path(from, to),
        }
    }

    /// Bring the index entry for `path` in line with what is on disk now.
    ///
    /// A regular file whose tags cannot be read is left as it is in the index
    /// and reported as [`ApiError::CodecError`].
    pub fn process_path(&mut self, path: &Path) -> Result<PathAction, ApiError> {
        let (absolute, segments) = path_segments(path)?;
        let disk = self.observe(&absolute)?;

        // A directory arriving with contents (moved in, or filled before its
        // own event was handled) is walked like a scan root.
        if matches!(disk, DiskState::Directory)
            && !is_symlink(&absolute)
            && self.store.resolve_path(&segments)?.is_none()
        {
            let report = self.scan_directory(&absolute);
            debug!(path = %absolute.display(), created = report.created, "Walked new directory");
            return Ok(PathAction::Scanned {
                indexed: report.created + report.updated,
                failed: report.failed,
            });
        }

        let writer = self.store.write()?;
        let action = apply_observation(&writer, &self.codec, &segments, disk)?;
        writer.commit()?;

        match action {
            PathAction::Skipped | PathAction::Unchanged(_) => {}
            _ => debug!(path = %absolute.display(), ?action, "Indexed path"),
        }
        Ok(action)
    }

    /// Relocate the node of `from` to `to`, keeping its id and tags.
    ///
    /// When `from` is not indexed there is nothing to relocate and `to` is
    /// processed as a fresh observation.
    pub fn move_path(&mut self, from: &Path, to: &Path) -> Result<PathAction, ApiError> {
        let (_, from_segments) = path_segments(from)?;
        let (to_absolute, to_segments) = path_segments(to)?;
        let Some((name, to_parent)) = to_segments.split_last() else {
            return Err(ApiError::InvalidPath(to_absolute));
        };

        let writer = self.store.write()?;
        let Some(source) = writer
            .resolve_path(&from_segments)?
            .map(|id| writer.node(id))
            .transpose()?
            .flatten()
        else {
            drop(writer);
            debug!(from = %from.display(), to = %to.display(), "Move source not indexed");
            return self.process_path(&to_absolute);
        };

        if let Some(existing) = writer.resolve_path(&to_segments)? {
            if existing == source.id {
                return Ok(PathAction::Unchanged(source.id));
            }
            if let Some(row) = writer.node(existing)? {
                remove_node(&writer, &row)?;
            }
        }
        let new_parent = writer.ensure_path(to_parent, None)?;
        writer.reparent(source.id, new_parent, name)?;
        writer.prune_upward(source.parent)?;
        writer.commit()?;

        debug!(
            id = source.id,
            from = %join_segments(&from_segments),
            to = %to_absolute.display(),
            "Moved node"
        );
        Ok(PathAction::Moved(source.id))
    }

    /// Remove every indexed path that no longer exists on disk.
    ///
    /// One post-order walk over the index tree: children are checked before
    /// their parents, so deletions prune bottom-up and a parent removed by a
    /// cascade is simply found gone when its turn comes.
    pub fn repair(&mut self) -> Result<RepairReport, ApiError> {
        let mut report = RepairReport::default();
        let mut vanished = Vec::new();

        // (children pushed, node id, segment)
        let mut stack: Vec<(bool, Option<NodeId>, Option<String>)> = vec![(false, None, None)];
        let mut parts: Vec<String> = Vec::new();
        while let Some((expanded, id, segment)) = stack.pop() {
            if !expanded {
                stack.push((true, id, segment.clone()));
                if let Some(segment) = segment {
                    parts.push(segment);
                }
                for child in self.store.children(id)? {
                    stack.push((false, Some(child.id), Some(child.segment)));
                }
                continue;
            }
            let Some(id) = id else {
                continue;
            };
            report.checked += 1;
            let path = PathBuf::from(join_segments(&parts));
            if disk_metadata(&path).is_none() {
                vanished.push((id, path));
            }
            parts.pop();
        }

        for (id, path) in vanished {
            match self.remove_vanished(id) {
                Ok(true) => {
                    info!(path = %path.display(), "No longer exists, removed from index");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove vanished path");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn remove_vanished(&mut self, id: NodeId) -> Result<bool, StorageError> {
        let writer = self.store.write()?;
        let Some(row) = writer.node(id)? else {
            return Ok(false);
        };
        remove_node(&writer, &row)?;
        writer.commit()?;
        Ok(true)
    }

    /// Run the create/update logic on every file under `root`.
    ///
    /// Failures are logged and counted per path; the walk continues.
    pub fn scan_directory(&mut self, root: &Path) -> ScanReport {
        let mut report = ScanReport::default();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Failed to walk entry");
                    report.failed += 1;
                    continue;
                }
            };
            if entry.file_type().is_dir() || self.ignore.is_ignored(entry.path()) {
                continue;
            }
            if !disk_metadata(entry.path()).is_some_and(|m| m.is_file()) {
                continue;
            }
            match self.process_path(entry.path()) {
                Ok(action) => report.record(action),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to index path");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn observe(&self, path: &Path) -> Result<DiskState, ApiError> {
        let Some(metadata) = disk_metadata(path) else {
            return Ok(DiskState::Absent);
        };
        if metadata.is_dir() {
            return Ok(DiskState::Directory);
        }
        if !metadata.is_file() {
            return Ok(DiskState::Absent);
        }
        let tags = self
            .codec
            .read_file(path)
            .map_err(|source| ApiError::CodecError {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(DiskState::File(if tags.is_empty() { untagged() } else { tags }))
    }
}

/// Metadata of whatever `path` resolves to, following symlinks. Scans, events
/// and repair all judge existence through this, so a dangling link counts as
/// gone and a link to a file counts as that file.
fn disk_metadata(path: &Path) -> Option<std::fs::Metadata> {
    std::fs::metadata(path).ok()
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

fn path_segments(path: &Path) -> Result<(PathBuf, Vec<String>), ApiError> {
    let absolute = absolutize(path).map_err(StorageError::from)?;
    let text = absolute
        .to_str()
        .ok_or_else(|| ApiError::InvalidPath(absolute.clone()))?;
    let segments = split_abs_path(text);
    if segments.is_empty() {
        return Err(ApiError::InvalidPath(absolute));
    }
    Ok((absolute, segments))
}

fn apply_observation(
    writer: &IndexWriter<'_>,
    codec: &dyn TagCodec,
    segments: &[String],
    disk: DiskState,
) -> Result<PathAction, StorageError> {
    let existing = match writer.resolve_path(segments)? {
        Some(id) => writer.node(id)?,
        None => None,
    };

    match (existing, disk) {
        (None, DiskState::Absent | DiskState::Directory) => Ok(PathAction::Skipped),
        (None, DiskState::File(tags)) => create_file(writer, codec, segments, &tags),
        (Some(row), DiskState::File(tags)) => match &row.tags {
            Some(blob) => {
                let old = match codec.decode(blob) {
                    Ok(old) => Some(old),
                    Err(e) => {
                        warn!(id = row.id, error = %e, "Stored tags unreadable, rewriting");
                        None
                    }
                };
                if writer.replace_tags(row.id, old.as_ref(), &tags, codec)? {
                    Ok(PathAction::Updated(row.id))
                } else {
                    Ok(PathAction::Unchanged(row.id))
                }
            }
            // a directory was replaced by a file of the same name
            None => {
                writer.delete_subtree(row.id)?;
                create_file(writer, codec, segments, &tags)
            }
        },
        (Some(row), DiskState::Directory) if row.tags.is_none() => Ok(PathAction::Skipped),
        (Some(row), DiskState::Absent | DiskState::Directory) => {
            remove_node(writer, &row)?;
            Ok(PathAction::Deleted(row.id))
        }
    }
}

fn create_file(
    writer: &IndexWriter<'_>,
    codec: &dyn TagCodec,
    segments: &[String],
    tags: &TagMap,
) -> Result<PathAction, StorageError> {
    let blob = codec.encode(tags);
    let id = writer
        .ensure_path(segments, Some(blob.as_str()))?
        .ok_or_else(|| StorageError::CorruptTree {
            node: 0,
            reason: "empty path".to_string(),
        })?;
    writer.insert_tags(id, tags, codec)?;
    Ok(PathAction::Created(id))
}

/// Delete a file node (tag entries first) or a whole structural subtree.
fn remove_node(writer: &IndexWriter<'_>, row: &NodeRow) -> Result<(), StorageError> {
    if row.tags.is_some() {
        writer.remove_all_tags(row.id)?;
        writer.delete_leaf(row.id)
    } else {
        writer.delete_subtree(row.id).map(|_| ())
    }
}
