//! End-to-end checks of the `fieldops` binary against a temporary log directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli_cmd(log_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fieldops").expect("fieldops binary should build");
    cmd.arg("--log-dir").arg(log_dir.path());
    cmd
}

#[test]
fn log_then_show_prints_entry() {
    let log_dir = TempDir::new().unwrap();

    cli_cmd(&log_dir)
        .args(["log", "warning", "gps signal lost", "--meta", "ticketId=INC-7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued warning entry."));

    cli_cmd(&log_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("=== App Crash Log File ==="))
        .stdout(predicate::str::contains("[WARNING] "))
        .stdout(predicate::str::contains("Message: gps signal lost"))
        .stdout(predicate::str::contains("\"ticketId\": \"INC-7\""));
}

#[test]
fn unknown_kind_is_rejected() {
    let log_dir = TempDir::new().unwrap();

    cli_cmd(&log_dir)
        .args(["log", "fatal", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown kind"));
}

#[test]
fn show_without_file_prints_placeholder() {
    let log_dir = TempDir::new().unwrap();

    cli_cmd(&log_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("No logs available"));

    cli_cmd(&log_dir)
        .arg("where")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no crash log yet)"));
}

#[test]
fn clear_leaves_only_header() {
    let log_dir = TempDir::new().unwrap();

    cli_cmd(&log_dir)
        .args(["log", "error", "sync failed", "--stack", "at sync (sync.dart:3)"])
        .assert()
        .success();

    cli_cmd(&log_dir)
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crash log cleared."));

    cli_cmd(&log_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync failed").not());

    cli_cmd(&log_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Has logs: false"));
}

#[test]
fn panic_is_captured_as_crash_entry() {
    let log_dir = TempDir::new().unwrap();

    cli_cmd(&log_dir)
        .args(["panic", "camera index out of range"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Panic captured"));

    cli_cmd(&log_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[CRASH] "))
        .stdout(predicate::str::contains("Message: camera index out of range"))
        .stdout(predicate::str::contains("\"isFatal\": false"));
}
