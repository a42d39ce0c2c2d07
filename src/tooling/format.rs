//! Format status and inspection results as text.

use crate::store::IndexStats;
use crate::types::TagMap;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Index statistics as human-readable text.
pub fn format_status_text(database: &Path, stats: &IndexStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Index Status")));
    out.push_str(&format!("  Database: {}\n\n", database.display()));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Count"]);
    table.add_row(vec!["Nodes".to_string(), stats.nodes.to_string()]);
    table.add_row(vec!["Indexed files".to_string(), stats.files.to_string()]);
    table.add_row(vec!["Tag entries".to_string(), stats.tag_entries.to_string()]);
    table.add_row(vec!["Distinct tags".to_string(), stats.distinct_tags.to_string()]);
    out.push_str(&format!("{}\n", table));
    out
}

#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub database: &'a Path,
    #[serde(flatten)]
    pub stats: &'a IndexStats,
}

/// Tags of one indexed file.
#[derive(Debug, Serialize)]
pub struct InspectReport<'a> {
    pub id: i64,
    pub path: &'a str,
    pub tags: &'a TagMap,
}

pub fn format_inspect_text(report: &InspectReport<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading(report.path)));
    out.push_str(&format!("  Node ID: {}\n\n", report.id));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Tag", "Value"]);
    for (key, values) in report.tags {
        for value in values {
            table.add_row(vec![
                key.clone(),
                value.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
    }
    out.push_str(&format!("{}\n", table));
    out
}
