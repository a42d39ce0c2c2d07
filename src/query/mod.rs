//! Query engine: token parsing, set-algebra execution over the tag index,
//! comparison filters, multi-key sorting and tag autocomplete.

pub mod engine;
pub mod natural;
pub mod parser;
pub mod rows;

pub use engine::{FileQuery, QueryEngine, TagQuery, TagSearch, DEFAULT_PAGE_SIZE};
pub use natural::natural_cmp;
pub use parser::{parse_query, Comparison, ComparisonFilter, ParsedQuery, SortDirection, SortKey};
pub use rows::{filter_rows, row_passes, sort_rows, sort_rows_with_rng, FileRow};
