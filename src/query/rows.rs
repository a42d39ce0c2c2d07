//! Candidate rows and the post-passes applied to them: comparison filters and
//! multi-key sorting.

use super::natural::natural_cmp;
use super::parser::{ComparisonFilter, SortDirection, SortKey};
use crate::types::{first_value, NodeId, TagMap};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

/// One query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub id: NodeId,
    pub segment: String,
    pub tags: TagMap,
}

impl FileRow {
    /// Value used by filters and sorting: the first value under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        first_value(&self.tags, key)
    }

    /// All values under `key`, joined for column output. Valueless tags
    /// contribute an empty string.
    pub fn column(&self, key: &str) -> String {
        self.tags
            .get(key)
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.as_deref().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default()
    }
}

/// Whether `row` passes every comparison filter. A missing key compares as
/// the empty string.
pub fn row_passes(filters: &[ComparisonFilter], row: &FileRow) -> bool {
    filters.iter().all(|filter| {
        let value = row.value(&filter.key).unwrap_or("");
        filter.op.accepts(natural_cmp(value, &filter.value))
    })
}

/// Lazily drop rows that fail a filter.
pub fn filter_rows<'a, I>(
    filters: &'a [ComparisonFilter],
    rows: I,
) -> impl Iterator<Item = FileRow> + 'a
where
    I: IntoIterator<Item = FileRow>,
    I::IntoIter: 'a,
{
    rows.into_iter().filter(move |row| row_passes(filters, row))
}

#[derive(Debug)]
enum SortValue<'a> {
    Natural(Option<&'a str>),
    Hashed(blake3::Hash),
}

fn compare_values(a: &SortValue<'_>, b: &SortValue<'_>) -> Ordering {
    match (a, b) {
        (SortValue::Natural(a), SortValue::Natural(b)) => match (a, b) {
            (Some(a), Some(b)) => natural_cmp(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        (SortValue::Hashed(a), SortValue::Hashed(b)) => a.as_bytes().cmp(b.as_bytes()),
        // Same key list for every row, so kinds always line up.
        _ => Ordering::Equal,
    }
}

fn sort_values<'a>(keys: &[SortKey], salt: &str, row: &'a FileRow) -> Vec<SortValue<'a>> {
    keys.iter()
        .map(|key| match key.direction {
            SortDirection::Rand => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(row.value(&key.key).unwrap_or("").as_bytes());
                hasher.update(salt.as_bytes());
                SortValue::Hashed(hasher.finalize())
            }
            SortDirection::Asc | SortDirection::Desc => SortValue::Natural(row.value(&key.key)),
        })
        .collect()
}

/// Sort rows by `keys`, using the thread RNG for the pre-shuffle and salt.
pub fn sort_rows(keys: &[SortKey], rows: Vec<FileRow>) -> Vec<FileRow> {
    sort_rows_with_rng(keys, rows, &mut rand::thread_rng())
}

/// Sort rows by `keys`.
///
/// Rows are shuffled first and then stably sorted, so rows equal on every
/// key come out in random order. Missing values sort after present ones
/// before the direction is applied. `Rand` keys compare a hash of the value
/// and a salt drawn once per call, so equal values stay together.
pub fn sort_rows_with_rng<R: Rng>(
    keys: &[SortKey],
    mut rows: Vec<FileRow>,
    rng: &mut R,
) -> Vec<FileRow> {
    let salt = format!("{:03}", rng.gen_range(0..1000));
    rows.shuffle(rng);
    if keys.is_empty() {
        return rows;
    }

    let mut order: Vec<(usize, Vec<SortValue<'_>>)> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| (index, sort_values(keys, &salt, row)))
        .collect();
    order.sort_by(|(_, a), (_, b)| {
        for (key, (x, y)) in keys.iter().zip(a.iter().zip(b.iter())) {
            let ordering = compare_values(x, y);
            let ordering = match key.direction {
                SortDirection::Desc => ordering.reverse(),
                SortDirection::Asc | SortDirection::Rand => ordering,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    let order: Vec<usize> = order.into_iter().map(|(index, _)| index).collect();

    let mut slots: Vec<Option<FileRow>> = rows.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
