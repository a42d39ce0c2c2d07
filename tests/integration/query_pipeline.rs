use super::write_tagged;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use taxis::indexer::{Indexer, PathAction};
use taxis::query::{filter_rows, parse_query, sort_rows_with_rng, FileRow, QueryEngine, TagSearch};
use taxis::store::IndexStore;
use taxis::types::NodeId;

struct Library {
    _dir: tempfile::TempDir,
    root: PathBuf,
    indexer: Indexer,
}

impl Library {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        Self {
            _dir: dir,
            root,
            indexer: Indexer::new(IndexStore::open_in_memory().unwrap()),
        }
    }

    fn add(&mut self, name: &str, lines: &[&str]) -> NodeId {
        let path = self.root.join(name);
        write_tagged(&path, lines);
        match self.indexer.process_path(&path).unwrap() {
            PathAction::Created(id) => id,
            other => panic!("expected creation of {}, got {:?}", name, other),
        }
    }

    fn store(&self) -> &IndexStore {
        self.indexer.store()
    }
}

fn run(store: &IndexStore, tokens: &[&str]) -> Vec<FileRow> {
    let query = parse_query(tokens);
    let engine = QueryEngine::new(store).with_page_size(2);
    let rows: Vec<FileRow> = engine.files(&query).map(Result::unwrap).collect();
    let filtered: Vec<FileRow> = filter_rows(&query.filters, rows).collect();
    if query.sort.is_empty() {
        return filtered;
    }
    sort_rows_with_rng(&query.sort, filtered, &mut StdRng::seed_from_u64(7))
}

fn segments(rows: &[FileRow]) -> Vec<&str> {
    rows.iter().map(|row| row.segment.as_str()).collect()
}

#[test]
fn comparison_filters_use_natural_order() {
    let mut lib = Library::new();
    lib.add("a.txt", &["date=99"]);
    lib.add("b.txt", &["date=100"]);
    lib.add("c.txt", &["date=7", "red"]);
    lib.add("d.txt", &["red"]);

    assert_eq!(segments(&run(lib.store(), &["date>=10"])), vec!["a.txt", "b.txt"]);
    assert_eq!(segments(&run(lib.store(), &["date<99"])), vec!["c.txt"]);
    assert_eq!(segments(&run(lib.store(), &["date<=99", "red"])), vec!["c.txt"]);
    // the comparison implies the key is present
    assert_eq!(segments(&run(lib.store(), &["date>0", "^red"])), vec!["a.txt", "b.txt"]);
}

#[test]
fn multi_key_sort_with_missing_values() {
    let mut lib = Library::new();
    lib.add("a.txt", &["kind=doc", "rank=10"]);
    lib.add("b.txt", &["kind=doc", "rank=9"]);
    lib.add("c.txt", &["kind=art", "rank=10"]);
    lib.add("d.txt", &["kind=doc"]);

    let rows = run(lib.store(), &["kind=%", "sort+:kind", "sort+:rank"]);
    assert_eq!(segments(&rows), vec!["c.txt", "b.txt", "a.txt", "d.txt"]);

    // descending puts the missing value first; a and c tie on rank
    let rows = run(lib.store(), &["kind=%", "sort-:rank"]);
    let order = segments(&rows);
    assert_eq!(order[0], "d.txt");
    let mut tied = vec![order[1], order[2]];
    tied.sort();
    assert_eq!(tied, vec!["a.txt", "c.txt"]);
    assert_eq!(order[3], "b.txt");
}

#[test]
fn columns_show_every_value() {
    let mut lib = Library::new();
    lib.add("a.txt", &["artist=x", "artist=y", "flag"]);

    let query = parse_query(&["artist=%", "col:artist", "col:flag", "col:missing"]);
    let engine = QueryEngine::new(lib.store());
    let row = engine.files(&query).next().unwrap().unwrap();
    let columns: Vec<String> = query.columns.iter().map(|c| row.column(c)).collect();
    assert_eq!(columns, vec!["x,y", "", ""]);
}

#[test]
fn tag_autocomplete_spans_pages() {
    let mut lib = Library::new();
    for n in 0..7 {
        lib.add(&format!("f{}.txt", n), &[&format!("year={}", 2000 + n), "shared"]);
    }

    let engine = QueryEngine::new(lib.store()).with_page_size(3);
    let mut tags = engine.tags(TagSearch::Prefix, "year=");
    let collected: Vec<String> = tags.by_ref().map(Result::unwrap).collect();
    assert_eq!(collected.len(), 7);
    assert_eq!(collected[0], "year=2000");
    assert_eq!(tags.pages_fetched(), 3);

    let anywhere: Vec<String> = engine
        .tags(TagSearch::Anywhere, "are")
        .map(Result::unwrap)
        .collect();
    assert_eq!(anywhere, vec!["shared"]);
}

#[test]
fn results_resolve_back_to_paths() {
    let mut lib = Library::new();
    let id = lib.add("nested/dir/file.txt", &["x"]);
    let engine = QueryEngine::new(lib.store());
    let expected: &Path = &lib.root.join("nested/dir/file.txt");
    assert_eq!(engine.path(id).unwrap(), expected.to_str().unwrap());
}
