use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn transcribe() -> Command {
    Command::cargo_bin("transcribe").unwrap()
}

#[test]
fn help_lists_subcommands() {
    transcribe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn run_requires_at_least_one_source() {
    transcribe()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SOURCE"));
}

#[test]
fn status_on_fresh_session_reports_nothing_processed() {
    let tmp = TempDir::new().unwrap();
    let session = tmp.path().join("session");

    transcribe()
        .args(["status", "--session-dir"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 0 of 0"))
        .stdout(predicate::str::contains("initialized"));
}

#[test]
fn reset_writes_a_fresh_state_file() {
    let tmp = TempDir::new().unwrap();
    let session = tmp.path().join("session");
    fs_err::create_dir_all(&session).unwrap();
    fs_err::write(session.join("state.json"), "{not valid json").unwrap();

    transcribe()
        .args(["reset", "--session-dir"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Session reset"));

    let content = fs_err::read_to_string(session.join("state.json")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(state["stage"], "initialized");
}
