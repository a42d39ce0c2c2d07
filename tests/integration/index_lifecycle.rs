use super::write_tagged;
use std::collections::BTreeSet;
use std::fs;
use taxis::codec::{PolytaxisCodec, TagCodec};
use taxis::indexer::{ChangeEvent, Indexer, PathAction};
use taxis::query::{parse_query, QueryEngine};
use taxis::store::IndexStore;
use taxis::types::NodeId;

fn tag_entries(store: &IndexStore, id: NodeId) -> BTreeSet<String> {
    let mut stmt = store
        .conn()
        .prepare("SELECT tag FROM tags WHERE file = ?1")
        .unwrap();
    stmt.query_map([id], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<BTreeSet<String>>>()
        .unwrap()
}

fn blob_entries(store: &IndexStore, id: NodeId) -> BTreeSet<String> {
    let codec = PolytaxisCodec;
    let blob = store.node(id).unwrap().unwrap().tags.unwrap();
    codec
        .decode(&blob)
        .unwrap()
        .iter()
        .flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| codec.encode_single(key, value.as_deref()))
        })
        .collect()
}

fn query_paths(store: &IndexStore, tokens: &[&str]) -> Vec<String> {
    let engine = QueryEngine::new(store);
    engine
        .files(&parse_query(tokens))
        .map(|row| engine.path(row.unwrap().id).unwrap())
        .collect()
}

#[test]
fn scan_then_query_by_tag() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let data = root.join("data");
    write_tagged(&data.join("photos/cat.jpg"), &["animal=cat", "red"]);
    write_tagged(&data.join("photos/dog.jpg"), &["animal=dog"]);
    fs::write(data.join("notes.txt"), "plain").unwrap();

    let store = IndexStore::open(&root.join("index.sqlite3")).unwrap();
    let mut indexer = Indexer::new(store);
    let report = indexer.scan_directory(&data);
    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 0);

    let store = indexer.store();
    assert_eq!(
        query_paths(store, &["red"]),
        vec![data.join("photos/cat.jpg").to_str().unwrap().to_string()]
    );
    assert_eq!(
        query_paths(store, &["untagged"]),
        vec![data.join("notes.txt").to_str().unwrap().to_string()]
    );
    assert_eq!(query_paths(store, &["animal=%"]).len(), 2);
    assert_eq!(query_paths(store, &[]).len(), 3);
}

#[test]
fn rescan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    write_tagged(&root.join("a/b.txt"), &["x"]);

    let mut indexer = Indexer::new(IndexStore::open_in_memory().unwrap());
    indexer.scan_directory(&root);
    let before = indexer.store().stats().unwrap();
    let report = indexer.scan_directory(&root);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.created, 0);
    assert_eq!(indexer.store().stats().unwrap(), before);
}

#[test]
fn tag_entries_follow_blob_after_updates() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let file = root.join("doc.txt");
    write_tagged(&file, &["date=99", "seven"]);

    let mut indexer = Indexer::new(IndexStore::open_in_memory().unwrap());
    let PathAction::Created(id) = indexer.process_path(&file).unwrap() else {
        panic!("expected creation");
    };
    assert_eq!(tag_entries(indexer.store(), id), blob_entries(indexer.store(), id));

    write_tagged(&file, &["date=100", "eight", "eq=a=b"]);
    assert_eq!(indexer.process_path(&file).unwrap(), PathAction::Updated(id));
    assert_eq!(tag_entries(indexer.store(), id), blob_entries(indexer.store(), id));
    assert!(tag_entries(indexer.store(), id).contains("date=100"));

    fs::write(&file, "no header").unwrap();
    assert_eq!(indexer.process_path(&file).unwrap(), PathAction::Updated(id));
    assert_eq!(
        tag_entries(indexer.store(), id),
        BTreeSet::from(["untagged".to_string()])
    );
}

#[test]
fn deletion_prunes_to_first_shared_ancestor() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let deep = root.join("a/b/c/deep.txt");
    let sibling = root.join("a/other.txt");
    write_tagged(&deep, &["x"]);
    write_tagged(&sibling, &["y"]);

    let mut indexer = Indexer::new(IndexStore::open_in_memory().unwrap());
    indexer.scan_directory(&root);
    let nodes_before = indexer.store().stats().unwrap().nodes;

    fs::remove_file(&deep).unwrap();
    let action = indexer
        .apply_change(&ChangeEvent::Removed(deep.clone()))
        .unwrap();
    assert!(matches!(action, PathAction::Deleted(_)));

    let store = indexer.store();
    // deep.txt, c and b are gone; a survives through other.txt
    assert_eq!(store.stats().unwrap().nodes, nodes_before - 3);
    let a = taxis::tree::path::split_abs_path(root.join("a").to_str().unwrap());
    assert!(store.resolve_path(&a).unwrap().is_some());
    assert_eq!(query_paths(store, &["x"]), Vec::<String>::new());
}

#[test]
fn move_keeps_id_and_prunes_old_parent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let from = root.join("old/dir/file.txt");
    write_tagged(&from, &["red"]);

    let mut indexer = Indexer::new(IndexStore::open_in_memory().unwrap());
    let PathAction::Created(id) = indexer.process_path(&from).unwrap() else {
        panic!("expected creation");
    };

    let to = root.join("new/file.txt");
    fs::create_dir_all(to.parent().unwrap()).unwrap();
    fs::rename(&from, &to).unwrap();
    let action = indexer
        .apply_change(&ChangeEvent::Renamed {
            from: from.clone(),
            to: to.clone(),
        })
        .unwrap();
    assert_eq!(action, PathAction::Moved(id));

    let store = indexer.store();
    assert_eq!(store.reconstruct_path(id).unwrap(), to.to_str().unwrap());
    let old = taxis::tree::path::split_abs_path(root.join("old").to_str().unwrap());
    assert_eq!(store.resolve_path(&old).unwrap(), None);
}

#[test]
fn move_with_unindexed_source_indexes_destination() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let to = root.join("arrived.txt");
    write_tagged(&to, &["fresh"]);

    let mut indexer = Indexer::new(IndexStore::open_in_memory().unwrap());
    let action = indexer
        .move_path(&root.join("never-seen.txt"), &to)
        .unwrap();
    assert!(matches!(action, PathAction::Created(_)));
    assert_eq!(query_paths(indexer.store(), &["fresh"]).len(), 1);
}

#[test]
fn repair_removes_files_deleted_while_offline() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let db = root.join("db/index.sqlite3");
    let data = root.join("data");
    write_tagged(&data.join("keep.txt"), &["keep"]);
    write_tagged(&data.join("gone/one.txt"), &["gone"]);
    write_tagged(&data.join("gone/two.txt"), &["gone"]);

    {
        let mut indexer = Indexer::new(IndexStore::open(&db).unwrap());
        indexer.scan_directory(&data);
    }
    fs::remove_dir_all(data.join("gone")).unwrap();

    let mut indexer = Indexer::new(IndexStore::open(&db).unwrap());
    let report = indexer.repair().unwrap();
    assert!(report.removed >= 2);
    assert_eq!(report.failed, 0);

    let store = indexer.store();
    assert_eq!(query_paths(store, &["gone"]), Vec::<String>::new());
    assert_eq!(
        query_paths(store, &["keep"]),
        vec![data.join("keep.txt").to_str().unwrap().to_string()]
    );
    let gone = taxis::tree::path::split_abs_path(data.join("gone").to_str().unwrap());
    assert_eq!(store.resolve_path(&gone).unwrap(), None);
}

#[test]
fn index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let db = root.join("index.sqlite3");
    let file = root.join("data/kept.txt");
    write_tagged(&file, &["persisted"]);

    {
        let mut indexer = Indexer::new(IndexStore::open(&db).unwrap());
        indexer.process_path(&file).unwrap();
    }
    let store = IndexStore::open(&db).unwrap();
    assert_eq!(
        query_paths(&store, &["persisted"]),
        vec![file.to_str().unwrap().to_string()]
    );
}
