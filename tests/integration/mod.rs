//! Integration tests for the taxis tag index

mod cli_commands;
mod cli_parse;
mod index_lifecycle;
mod query_pipeline;

use std::fs;
use std::path::Path;

/// Write a file with an unsized polytaxis header.
pub fn write_tagged(path: &Path, lines: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut text = String::from("polytaxis00u\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str("<<<<\nbody\n");
    fs::write(path, text).unwrap();
}
