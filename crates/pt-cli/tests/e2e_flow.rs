//! End-to-end tests driving the `pt` binary.
//!
//! Tests the full pipeline: record/ingest → rename/filter → query → export → import.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn pt_binary() -> String {
    env!("CARGO_BIN_EXE_pt").to_string()
}

/// A `pt` invocation isolated to one ledger file and an empty HOME.
fn pt(temp: &Path, db: &Path) -> Command {
    let mut command = Command::new(pt_binary());
    command
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join(".config"))
        .env("PT_DATABASE_PATH", db)
        .env("PT_TIMELINE_ZONE", "utc")
        .env_remove("PT_HIDE_BLACKLISTED")
        .env_remove("RUST_LOG");
    command
}

fn run_ok(temp: &Path, db: &Path, args: &[&str]) -> String {
    let output = pt(temp, db).args(args).output().expect("failed to run pt");
    assert_success(&output, args);
    String::from_utf8(output.stdout).unwrap()
}

fn assert_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "pt {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn setup() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("data").join("playtime.db");
    (temp, db)
}

fn record(temp: &Path, db: &Path, raw: &str, start: &str, end: &str) {
    run_ok(temp, db, &["record", raw, "--start", start, "--end", end]);
}

#[test]
fn test_record_and_summarize() {
    let (temp, db) = setup();
    record(
        temp.path(),
        &db,
        "X",
        "2024-03-10T23:00:00+00:00",
        "2024-03-11T01:30:00+00:00",
    );
    assert!(db.exists(), "database should be created in a fresh directory");

    let json = run_ok(
        temp.path(),
        &db,
        &["summary", "--start", "2024-03-10", "--end", "2024-03-11", "--json"],
    );
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["items"][0]["name"], "X");
    assert_eq!(value["items"][0]["seconds"], 9000.0);

    let history = run_ok(temp.path(), &db, &["history", "--json"]);
    let entries: serde_json::Value = serde_json::from_str(&history).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1, "midnight split merges back");
    assert_eq!(entries[0]["seconds"], 9000.0);
}

#[test]
fn test_blacklisted_identity_disappears_from_reports() {
    let (temp, db) = setup();
    record(
        temp.path(),
        &db,
        "X",
        "2024-03-10T23:00:00+00:00",
        "2024-03-11T01:30:00+00:00",
    );
    run_ok(temp.path(), &db, &["filter", "add", "blacklist", "X"]);

    let json = run_ok(
        temp.path(),
        &db,
        &["summary", "--start", "2024-03-10", "--end", "2024-03-11", "--json"],
    );
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["items"].as_array().unwrap().is_empty());

    let known = run_ok(temp.path(), &db, &["known", "--json"]);
    let known: serde_json::Value = serde_json::from_str(&known).unwrap();
    assert_eq!(known[0]["blacklisted"], true);

    let hidden = run_ok(temp.path(), &db, &["history", "--hide-blacklisted", "--json"]);
    assert_eq!(hidden.trim(), "[]");
}

#[test]
fn test_rename_chain_groups_identities() {
    let (temp, db) = setup();
    record(
        temp.path(),
        &db,
        "x.exe",
        "2024-03-10T10:00:00+00:00",
        "2024-03-10T11:00:00+00:00",
    );
    record(
        temp.path(),
        &db,
        "x64.exe",
        "2024-03-10T12:00:00+00:00",
        "2024-03-10T12:30:00+00:00",
    );
    run_ok(temp.path(), &db, &["rename", "x.exe", "Y"]);
    run_ok(temp.path(), &db, &["rename", "x64.exe", "Y"]);
    run_ok(temp.path(), &db, &["rename", "Y", "Z"]);

    let json = run_ok(
        temp.path(),
        &db,
        &["summary", "--start", "2024-03-10", "--end", "2024-03-10", "--json"],
    );
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        value["items"],
        serde_json::json!([{"name": "Z", "seconds": 5400.0}])
    );
}

#[test]
fn test_ingest_from_stdin() {
    let (temp, db) = setup();
    let mut child = pt(temp.path(), &db)
        .arg("ingest")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn pt ingest");
    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(
            stdin,
            r#"{{"raw_identity": "hades.exe", "start": "2024-03-10T20:00:00+01:00", "end": "2024-03-10T21:00:00+01:00"}}"#
        )
        .unwrap();
        writeln!(stdin, "garbage").unwrap();
        writeln!(
            stdin,
            r#"{{"raw_identity": "celeste.exe", "start": "2024-03-10T23:30:00+01:00", "end": "2024-03-11T00:30:00+01:00"}}"#
        )
        .unwrap();
    }
    let output = child.wait_with_output().unwrap();
    assert_success(&output, &["ingest"]);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Recorded 2 session(s) as 3 segment(s)."), "{stdout}");
    assert!(stdout.contains("Rejected 1 malformed line(s)"), "{stdout}");

    let status = run_ok(temp.path(), &db, &["status", "--json"]);
    let status: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(status["status"]["segments"], 3);
    assert_eq!(status["status"]["raw_identities"], 2);
}

#[test]
fn test_timeline_uses_configured_zone() {
    let (temp, db) = setup();
    record(
        temp.path(),
        &db,
        "X",
        "2024-03-11T08:00:00+00:00",
        "2024-03-11T09:15:00+00:00",
    );
    let json = run_ok(temp.path(), &db, &["timeline", "--date", "2024-03-11", "--json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["zone"], "utc");
    assert_eq!(
        value["segments"],
        serde_json::json!([{"name": "X", "start_sec": 28800, "end_sec": 33300}])
    );
}

#[test]
fn test_export_import_round_trip() {
    let (temp, db) = setup();
    record(
        temp.path(),
        &db,
        "X",
        "2024-03-10T23:00:00+00:00",
        "2024-03-11T01:30:00+00:00",
    );
    run_ok(temp.path(), &db, &["rename", "X", "Game X"]);
    run_ok(temp.path(), &db, &["finished", "Game X", "--date", "2024-03-11"]);
    let export_path = temp.path().join("export.json");
    run_ok(
        temp.path(),
        &db,
        &["export", "--output", export_path.to_str().unwrap()],
    );

    let other = temp.path().join("other").join("playtime.db");
    let output = run_ok(
        temp.path(),
        &other,
        &["import", export_path.to_str().unwrap()],
    );
    assert!(output.contains("segments: 2 new, 0 already present"), "{output}");

    // importing again is a no-op for segments
    let output = run_ok(
        temp.path(),
        &other,
        &["import", export_path.to_str().unwrap()],
    );
    assert!(output.contains("segments: 0 new, 2 already present"), "{output}");

    let meta = run_ok(
        temp.path(),
        &other,
        &["meta", "--start", "2024-03-10", "--end", "2024-03-11", "--json"],
    );
    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
    assert_eq!(
        meta["games"],
        serde_json::json!([{"name": "Game X", "is_new": true, "finished_in_period": true}])
    );
}

#[test]
fn test_invalid_input_fails_cleanly() {
    let (temp, db) = setup();
    let output = pt(temp.path(), &db)
        .args(["record", "X", "--start", "yesterday", "--end", "today"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid start time"));

    let output = pt(temp.path(), &db)
        .args(["summary", "--start", "2024-03-11", "--end", "2024-03-10"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let output = pt(temp.path(), &db)
        .args(["filter", "add", "greylist", "X"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
