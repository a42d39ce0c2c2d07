//! Query token parsing.
//!
//! Tokens are recognized by prefix, in order: `col:`, `sort+:`, `sort-:`,
//! `sort?:`, `^`, then comparisons, then plain includes. A token that fits no
//! rule is an include; parsing never fails.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Comparison operator of a post-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    /// Whether `ordering` (row value compared to the literal) passes.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessOrEqual => ordering != Ordering::Greater,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComparisonFilter {
    pub op: Comparison,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
    Rand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub direction: SortDirection,
    pub key: String,
}

/// A parsed query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub includes: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub filters: Vec<ComparisonFilter>,
    pub sort: Vec<SortKey>,
    pub columns: Vec<String>,
}

impl ParsedQuery {
    /// True when the query has no set terms, so every tagged file matches.
    pub fn is_unrestricted(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    fn request_column(&mut self, key: &str) {
        if !self.columns.iter().any(|c| c == key) {
            self.columns.push(key.to_string());
        }
    }

    fn add_filter(&mut self, op: Comparison, key: &str, value: &str) {
        self.includes.insert(format!("{}=%", key));
        let filter = ComparisonFilter {
            op,
            key: key.to_string(),
            value: value.to_string(),
        };
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
        self.request_column(key);
    }
}

/// Strip `prefix`, requiring something to remain.
fn shift<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    token.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// Detect a comparison operator.
///
/// `>=` matches anywhere. `>`, `<=` and `<` match only if their rightmost
/// occurrence is left of the rightmost `=`, or the token has no `=`. That
/// keeps `key10=frog>prince` an equality include.
fn detect_comparison(token: &str) -> Option<(Comparison, &str, &str)> {
    let equal_at = token.rfind('=');
    let left_of_equal = |at: Option<usize>| match (at, equal_at) {
        (Some(at), Some(equal)) => at <= equal,
        (Some(_), None) => true,
        (None, _) => false,
    };
    let split = |op: Comparison| {
        token
            .split_once(op.symbol())
            .map(|(key, value)| (op, key, value))
    };

    if token.contains(">=") {
        return split(Comparison::GreaterOrEqual);
    }
    if left_of_equal(token.rfind('>')) {
        return split(Comparison::Greater);
    }
    if token.contains("<=") {
        return split(Comparison::LessOrEqual);
    }
    if left_of_equal(token.rfind('<')) {
        return split(Comparison::Less);
    }
    None
}

/// Parse query tokens.
pub fn parse_query<S: AsRef<str>>(tokens: &[S]) -> ParsedQuery {
    let mut query = ParsedQuery::default();
    for token in tokens {
        let token = token.as_ref();
        if let Some(column) = shift(token, "col:") {
            query.request_column(column);
            continue;
        }
        let sort = [
            ("sort+:", SortDirection::Asc),
            ("sort-:", SortDirection::Desc),
            ("sort?:", SortDirection::Rand),
        ]
        .into_iter()
        .find_map(|(prefix, direction)| shift(token, prefix).map(|key| (direction, key)));
        if let Some((direction, key)) = sort {
            query.request_column(key);
            query.sort.push(SortKey {
                direction,
                key: key.to_string(),
            });
            continue;
        }
        if let Some(tag) = shift(token, "^") {
            query.excludes.insert(tag.to_string());
            continue;
        }
        if let Some((op, key, value)) = detect_comparison(token) {
            query.add_filter(op, key, value);
            continue;
        }
        query.includes.insert(token.to_string());
    }
    query
}
