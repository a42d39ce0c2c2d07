//! Ignore rules shared by the directory scan and the watcher.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;

/// Glob ignore patterns plus exact path prefixes.
///
/// Patterns containing glob syntax are matched against the whole path, with
/// `*` and `**` both crossing separators. A pattern ending in `/**` also
/// covers the directory itself. Patterns without glob syntax match as a
/// substring. Prefixes are used for the index database itself, whose own
/// writes must never be indexed.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    globs: GlobSet,
    literals: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            globs: GlobSet::empty(),
            literals: Vec::new(),
            prefixes: Vec::new(),
        }
    }
}

impl IgnoreRules {
    /// Compile `patterns`. Invalid globs are logged and left out.
    pub fn new(patterns: Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut literals = Vec::new();
        for pattern in patterns.iter().map(|p| normalize(p)) {
            if !pattern.contains(['*', '?', '[', '{']) {
                literals.push(pattern);
                continue;
            }
            let mut variants = vec![pattern.clone()];
            if let Some(dir) = pattern.strip_suffix("/**").filter(|d| !d.is_empty()) {
                variants.push(dir.to_string());
            }
            for variant in variants {
                match Glob::new(&variant) {
                    Ok(glob) => {
                        builder.add(glob);
                    }
                    Err(e) => warn!(pattern = %variant, error = %e, "Invalid ignore pattern"),
                }
            }
        }
        let globs = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to compile ignore patterns");
            GlobSet::empty()
        });
        Self {
            globs,
            literals,
            prefixes: Vec::new(),
        }
    }

    /// Also ignore every path starting with `prefix` (as a string, so
    /// `index.sqlite3` covers `index.sqlite3-wal`).
    pub fn with_prefix(mut self, prefix: &Path) -> Self {
        self.prefixes.push(normalize(&prefix.to_string_lossy()));
        self
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let path = normalize(&path.to_string_lossy());
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
            || self.literals.iter().any(|literal| path.contains(literal.as_str()))
            || self.globs.is_match(path.as_str())
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
