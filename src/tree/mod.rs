//! Filesystem-side helpers: path decomposition and ignore rules.

pub mod ignore;
pub mod path;
