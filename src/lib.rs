//! Taxis: Filesystem Tag Index
//!
//! Mirrors directory trees into a SQLite index of file tags, keeps it current
//! from filesystem events, and answers boolean tag queries with comparison
//! filters and multi-key sorting.

pub mod codec;
pub mod config;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod query;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod watch;
