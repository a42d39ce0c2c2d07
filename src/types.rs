//! Core types shared by the index, the update protocol, and the query engine.

use std::collections::{BTreeMap, BTreeSet};

/// NodeId: storage-assigned identifier of one mirrored path segment
pub type NodeId = i64;

/// Decoded tag set of one file: key -> values, where `None` is the no-value marker
pub type TagMap = BTreeMap<String, BTreeSet<Option<String>>>;

/// Tag given to readable files that carry no tags of their own
pub const UNTAGGED: &str = "untagged";

/// Build a tag map holding only the `untagged` marker.
pub fn untagged() -> TagMap {
    let mut tags = TagMap::new();
    tags.entry(UNTAGGED.to_string()).or_default().insert(None);
    tags
}

/// First value stored under `key`.
///
/// Returns `None` when the key is absent. A key that only carries the no-value
/// marker yields the empty string.
pub fn first_value<'a>(tags: &'a TagMap, key: &str) -> Option<&'a str> {
    let values = tags.get(key)?;
    Some(
        values
            .iter()
            .flatten()
            .next()
            .map(String::as_str)
            .unwrap_or(""),
    )
}
