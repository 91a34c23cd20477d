//! `DuckDbCli` subprocess handling, using `/bin/sh` as a stand-in for duckdb.
//!
//! The runner is invoked as `<binary> <db> -c <command>`, so with `sh` as the
//! binary the "database" is a script that sees `-c <command>` as `$1 $2`.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_tools::{DuckDbCli, SqlRunner, ToolsError};

fn script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake.db");
    std::fs::write(&path, format!("{body}\n")).unwrap();
    path
}

fn runner(db: &Path) -> DuckDbCli {
    DuckDbCli::new(db).with_binary("/bin/sh")
}

#[tokio::test]
async fn passes_command_as_a_single_argument() {
    let dir = tempfile::tempdir().unwrap();
    let db = script(dir.path(), r#"printf '%s|%s|%s' "$#" "$1" "$2""#);

    let out = runner(&db).execute("SELECT 'a; b' AS \"x y\";").await.unwrap();
    assert_eq!(out, "2|-c|SELECT 'a; b' AS \"x y\";");
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let db = script(
        dir.path(),
        "echo 'Catalog Error: Table with name nope does not exist!' >&2; exit 1",
    );

    let err = runner(&db).execute("SELECT * FROM nope;").await.unwrap_err();
    match err {
        ToolsError::QueryFailed { stderr, .. } => assert!(stderr.contains("Catalog Error")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let runner = DuckDbCli::new("analytics.db").with_binary("/nonexistent/duckdb");
    let err = runner.execute(".tables").await.unwrap_err();
    assert!(matches!(err, ToolsError::Spawn { .. }));
}

#[tokio::test]
async fn slow_query_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let db = script(dir.path(), "sleep 5");

    let err = runner(&db)
        .with_timeout(Duration::from_millis(200))
        .execute("SELECT 1;")
        .await
        .unwrap_err();
    assert!(matches!(err, ToolsError::QueryTimeout(_)));
}
