//! CLI tests for `ink`.
//!
//! Spawns the binary and checks exit codes and the JSON printed on stdout.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use chrono::{Duration, Utc};
use serde_json::Value;

use ink_engine::exit_codes;
use ink_engine::test_support::TestRepo;

fn ink(repo: &TestRepo, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ink"))
        .arg("--repo")
        .arg(repo.path())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ink");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("ink output")
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

#[test]
fn open_then_close_exits_ok() {
    let repo = TestRepo::new().expect("repo");

    let output = ink(&repo, &["open"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let payload = json(&output);
    assert_eq!(payload["status"], "open");
    assert_eq!(payload["config"]["words_per_page"], 10);
    assert!(payload["current_review"]["instructions"].is_array());

    let output = ink(
        &repo,
        &["close", "--summary", "Mara climbs the tower."],
        "The stairs were wet and the rail was cold.\n",
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let payload = json(&output);
    assert_eq!(payload["status"], "closed");
    assert_eq!(payload["session_word_count"], 9);
    let summary = repo.read("Global Material/Summary.md").expect("summary");
    assert!(summary.ends_with("Mara climbs the tower.\n"));
}

#[test]
fn live_lock_exits_locked() {
    let repo = TestRepo::new().expect("repo");
    repo.plant_lock(Utc::now(), Duration::minutes(5))
        .expect("lock");

    let output = ink(&repo, &["open"], "");
    assert_eq!(output.status.code(), Some(exit_codes::LOCKED));
    let payload = json(&output);
    assert_eq!(payload["status"], "aborted");
    assert_eq!(payload["session_already_run"], true);
}

#[test]
fn kill_request_exits_killed() {
    let repo = TestRepo::new().expect("repo");
    repo.write(".ink-kill", "").expect("kill");

    let output = ink(&repo, &["open"], "");
    assert_eq!(output.status.code(), Some(exit_codes::KILLED));
    assert_eq!(json(&output)["kill_requested"], true);
}

#[test]
fn close_without_session_prints_error_json() {
    let repo = TestRepo::new().expect("repo");

    let output = ink(&repo, &["close"], "Some prose.\n");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let payload = json(&output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["kind"], "no_active_session");
    assert!(!output.stderr.is_empty());
}

#[test]
fn rollback_without_terminal_needs_yes() {
    let repo = TestRepo::new().expect("repo");

    let output = ink(&repo, &["rollback"], "");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert_eq!(json(&output)["kind"], "confirmation_required");

    let output = ink(&repo, &["rollback", "--yes"], "");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert_eq!(json(&output)["kind"], "no_snapshot");
}

#[test]
fn missing_config_is_reported() {
    let repo = TestRepo::new().expect("repo");
    std::fs::remove_file(repo.paths().config_path).expect("remove config");

    let output = ink(&repo, &["status"], "");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert_eq!(json(&output)["kind"], "config_missing");
}

#[test]
fn status_prints_ledger() {
    let repo = TestRepo::new().expect("repo");

    let output = ink(&repo, &["status"], "");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let payload = json(&output);
    assert_eq!(payload["phase"], "idle");
    assert_eq!(payload["current_chapter"], 1);
    assert_eq!(payload["lock"]["state"], "free");
    assert_eq!(payload["target_length"], 200);
}
