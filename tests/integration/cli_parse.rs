use clap::Parser;
use std::path::PathBuf;
use taxis::config::TaxisConfig;
use taxis::query::TagSearch;
use taxis::tooling::cli::{logging_config, Cli, Commands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn query_flags() {
    let cli = parse(&["taxis", "query", "-n", "5", "-0", "-c", "red", "^blue", "col:date"]);
    match cli.command {
        Commands::Query {
            tokens,
            limit,
            print0,
            columns,
            tags,
        } => {
            assert_eq!(tokens, vec!["red", "^blue", "col:date"]);
            assert_eq!(limit, Some(5));
            assert!(print0);
            assert!(columns);
            assert_eq!(tags, None);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn tags_flag_defaults_to_prefix() {
    let cli = parse(&["taxis", "query", "date=", "--tags"]);
    let Commands::Query { tokens, tags, .. } = cli.command else {
        panic!("expected query");
    };
    assert_eq!(tokens, vec!["date="]);
    assert_eq!(tags, Some(TagSearch::Prefix));

    let cli = parse(&["taxis", "query", "-t", "anywhere", "ate"]);
    let Commands::Query { tokens, tags, .. } = cli.command else {
        panic!("expected query");
    };
    assert_eq!(tokens, vec!["ate"]);
    assert_eq!(tags, Some(TagSearch::Anywhere));
}

#[test]
fn monitor_and_global_flags() {
    let cli = parse(&[
        "taxis",
        "monitor",
        "--scan",
        "/srv/music",
        "/srv/photos",
        "--database",
        "/tmp/index.sqlite3",
        "--log-level",
        "trace",
    ]);
    assert_eq!(cli.database, Some(PathBuf::from("/tmp/index.sqlite3")));
    let Commands::Monitor { directories, scan } = &cli.command else {
        panic!("expected monitor");
    };
    assert!(*scan);
    assert_eq!(
        directories,
        &vec![PathBuf::from("/srv/music"), PathBuf::from("/srv/photos")]
    );

    let logging = logging_config(&cli, &TaxisConfig::default());
    assert_eq!(logging.level, "trace");
}

#[test]
fn verbose_raises_level_unless_overridden() {
    let cli = parse(&["taxis", "--verbose", "status"]);
    assert_eq!(logging_config(&cli, &TaxisConfig::default()).level, "debug");

    let cli = parse(&["taxis", "--verbose", "--log-level", "warn", "status", "--format", "json"]);
    assert_eq!(logging_config(&cli, &TaxisConfig::default()).level, "warn");
    let Commands::Status { format } = cli.command else {
        panic!("expected status");
    };
    assert_eq!(format, "json");
}

#[test]
fn path_and_inspect() {
    let cli = parse(&["taxis", "path", "42"]);
    assert!(matches!(cli.command, Commands::Path { id: 42 }));

    let cli = parse(&["taxis", "inspect", "notes.txt"]);
    let Commands::Inspect { path, format } = cli.command else {
        panic!("expected inspect");
    };
    assert_eq!(path, PathBuf::from("notes.txt"));
    assert_eq!(format, "text");
}

#[test]
fn rejects_bad_arguments() {
    assert!(Cli::try_parse_from(["taxis", "monitor"]).is_err());
    assert!(Cli::try_parse_from(["taxis", "path", "seven"]).is_err());
    assert!(Cli::try_parse_from(["taxis", "query", "--tags", "middle"]).is_err());
    assert!(Cli::try_parse_from(["taxis", "query", "-n", "many"]).is_err());
    assert!(Cli::try_parse_from(["taxis"]).is_err());
}

#[test]
fn log_file_flag_reaches_the_file_writer() {
    let cli = parse(&["taxis", "--log-output", "file", "--log-file", "/tmp/taxis-cli.log", "status"]);
    let logging = logging_config(&cli, &TaxisConfig::default());
    assert_eq!(logging.file, Some(PathBuf::from("/tmp/taxis-cli.log")));
    if std::env::var("TAXIS_LOG_FILE").is_err() {
        assert_eq!(
            taxis::logging::resolve_log_file_path(logging.file).unwrap(),
            PathBuf::from("/tmp/taxis-cli.log")
        );
    }
}
