//! Tooling & Integration Layer
//!
//! The `taxis` command line: argument parsing, command execution and output
//! formatting.

pub mod cli;
pub mod format;

pub use cli::{logging_config, Cli, CliContext, CommandOutput, Commands};
