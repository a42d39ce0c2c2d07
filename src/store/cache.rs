//! Bounded cache of parent links used by path reconstruction.

use crate::types::NodeId;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Default number of cached links.
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 4096;

/// One step of a parent chain: the segment of a node and the node above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLink {
    pub parent: Option<NodeId>,
    pub segment: String,
}

/// LRU cache of `id -> (parent, segment)`.
///
/// Cached links go stale as soon as the tree is mutated, so every mutating
/// store operation calls [`PathCache::invalidate`]. Readers sharing a database
/// with a separate writer process invalidate between queries.
pub struct PathCache {
    links: Mutex<LruCache<NodeId, PathLink>>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            links: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<PathLink> {
        self.links.lock().get(&id).cloned()
    }

    pub fn insert(&self, id: NodeId, link: PathLink) {
        self.links.lock().put(id, link);
    }

    /// Drop every cached link.
    pub fn invalidate(&self) {
        self.links.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_CAPACITY)
    }
}
