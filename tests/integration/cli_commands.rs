use super::write_tagged;
use std::path::PathBuf;
use taxis::config::TaxisConfig;
use taxis::error::ApiError;
use taxis::indexer::Indexer;
use taxis::query::TagSearch;
use taxis::store::IndexStore;
use taxis::tooling::cli::{CliContext, Commands};

struct Fixture {
    _dir: tempfile::TempDir,
    data: PathBuf,
    context: CliContext,
}

/// Three files indexed in a known order so result ids are predictable.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    let data = root.join("data");
    let db = root.join("index.sqlite3");
    write_tagged(&data.join("one.txt"), &["date=99", "color=red"]);
    write_tagged(&data.join("two.txt"), &["date=100", "color=blue"]);
    write_tagged(&data.join("three.txt"), &["date=103", "under"]);

    let mut indexer = Indexer::new(IndexStore::open(&db).unwrap());
    for name in ["one.txt", "two.txt", "three.txt"] {
        indexer.process_path(&data.join(name)).unwrap();
    }
    drop(indexer);

    Fixture {
        _dir: dir,
        data,
        context: CliContext::new(TaxisConfig::default(), db),
    }
}

fn query(tokens: &[&str]) -> Commands {
    Commands::Query {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        limit: None,
        print0: false,
        columns: false,
        tags: None,
    }
}

impl Fixture {
    fn path(&self, name: &str) -> String {
        self.data.join(name).to_str().unwrap().to_string()
    }
}

#[test]
fn query_prints_matching_paths() {
    let fx = fixture();
    let output = fx.context.execute(&query(&["date=%", "^under"])).unwrap();
    assert_eq!(
        output.stdout,
        format!("{}\n{}\n", fx.path("one.txt"), fx.path("two.txt"))
    );
    assert_eq!(output.stderr, None);
    assert_eq!(output.exit_code, 0);
}

#[test]
fn query_sorts_and_prints_columns() {
    let fx = fixture();
    let command = Commands::Query {
        tokens: vec![
            "date>=100".to_string(),
            "sort-:date".to_string(),
            "col:date".to_string(),
            "col:color".to_string(),
        ],
        limit: None,
        print0: false,
        columns: true,
        tags: None,
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout, "103\t\n100\tblue\n");
}

#[test]
fn query_limit_reports_truncation() {
    let fx = fixture();
    let command = Commands::Query {
        tokens: vec![],
        limit: Some(2),
        print0: false,
        columns: false,
        tags: None,
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout.lines().count(), 2);
    assert_eq!(output.stderr.as_deref(), Some("Stopped at 2 results."));

    let command = Commands::Query {
        tokens: vec![],
        limit: Some(2),
        print0: true,
        columns: false,
        tags: None,
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout.matches('\0').count(), 2);
    assert!(!output.stdout.contains('\n'));
    assert_eq!(output.stderr, None);
}

#[test]
fn limit_applies_after_sorting() {
    let fx = fixture();
    let command = Commands::Query {
        tokens: vec!["sort-:date".to_string()],
        limit: Some(1),
        print0: false,
        columns: false,
        tags: None,
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout, format!("{}\n", fx.path("three.txt")));
}

#[test]
fn tag_mode_lists_tags() {
    let fx = fixture();
    let command = Commands::Query {
        tokens: vec!["date=".to_string()],
        limit: None,
        print0: false,
        columns: false,
        tags: Some(TagSearch::Prefix),
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout, "date=100\ndate=103\ndate=99\n");

    let command = Commands::Query {
        tokens: vec!["e".to_string()],
        limit: None,
        print0: false,
        columns: false,
        tags: Some(TagSearch::Anywhere),
    };
    let output = fx.context.execute(&command).unwrap();
    assert_eq!(output.stdout, "color=blue\ncolor=red\ndate=100\ndate=103\ndate=99\nunder\n");
}

#[test]
fn tag_mode_rejects_several_arguments() {
    let fx = fixture();
    let command = Commands::Query {
        tokens: vec!["a".to_string(), "b".to_string()],
        limit: None,
        print0: false,
        columns: false,
        tags: Some(TagSearch::Prefix),
    };
    assert!(matches!(fx.context.execute(&command), Err(ApiError::Usage(_))));
}

#[test]
fn path_resolves_ids() {
    let fx = fixture();
    let output = fx.context.execute(&query(&["under"])).unwrap();
    let path = output.stdout.trim_end().to_string();
    assert_eq!(path, fx.path("three.txt"));

    let store = IndexStore::open(fx.context.database()).unwrap();
    let segments = taxis::tree::path::split_abs_path(&path);
    let id = store.resolve_path(&segments).unwrap().unwrap();
    drop(store);

    let output = fx.context.execute(&Commands::Path { id }).unwrap();
    assert_eq!(output.stdout, format!("{}\n", path));

    let output = fx.context.execute(&Commands::Path { id: 999_999 }).unwrap();
    assert_eq!(output.exit_code, 1);
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_some());
}

#[test]
fn inspect_reports_tags() {
    let fx = fixture();
    let command = Commands::Inspect {
        path: fx.data.join("one.txt"),
        format: "json".to_string(),
    };
    let output = fx.context.execute(&command).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(value["path"], fx.path("one.txt"));
    assert_eq!(value["tags"]["color"], serde_json::json!(["red"]));
    assert_eq!(value["tags"]["date"], serde_json::json!(["99"]));

    let command = Commands::Inspect {
        path: fx.data.join("three.txt"),
        format: "text".to_string(),
    };
    let output = fx.context.execute(&command).unwrap();
    assert!(output.stdout.contains("under"));
    assert!(output.stdout.contains("103"));

    // structural nodes are not files
    let command = Commands::Inspect {
        path: fx.data.clone(),
        format: "text".to_string(),
    };
    assert_eq!(fx.context.execute(&command).unwrap().exit_code, 1);
}

#[test]
fn status_counts_the_index() {
    let fx = fixture();
    let command = Commands::Status {
        format: "json".to_string(),
    };
    let output = fx.context.execute(&command).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(value["files"], 3);
    assert_eq!(value["tag_entries"], 6);
    assert_eq!(value["distinct_tags"], 6);
}
