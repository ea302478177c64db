use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn run_taskmill(root: &Path, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("taskmill");
    let mut cmd = Command::new(binary);
    cmd.current_dir(root);
    cmd.env_remove("TASKMILL_DIR");
    cmd.arg("--format").arg("json");
    cmd.args(args);
    cmd.output().expect("taskmill command executes")
}

fn run_taskmill_ok(root: &Path, args: &[&str]) -> Output {
    let output = run_taskmill(root, args);
    assert!(
        output.status.success(),
        "command failed: taskmill {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_taskmill_json(root: &Path, args: &[&str]) -> Value {
    let output = run_taskmill_ok(root, args);
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn run_taskmill_err_json(root: &Path, args: &[&str]) -> Value {
    let output = run_taskmill(root, args);
    assert!(
        !output.status.success(),
        "command unexpectedly succeeded: taskmill {}",
        args.join(" ")
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().expect("stderr has an error line");
    serde_json::from_str(last).expect("error envelope is JSON")
}

#[test]
fn test_cli_add_update_complete() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);

    let task = run_taskmill_json(dir.path(), &["add", "Test task"]);
    assert_eq!(task["id"], 1);
    assert_eq!(task["status"], "open");
    assert_eq!(task["category"], "simple");

    let task = run_taskmill_json(dir.path(), &["update", "1", "--status", "in-progress"]);
    assert_eq!(task["status"], "in-progress");
    assert_eq!(task["title"], "Test task");

    let task = run_taskmill_json(dir.path(), &["complete", "1", "-c", "All done"]);
    assert_eq!(task["status"], "closed");
    assert!(task["description"].as_str().unwrap().contains("All done"));

    let active = run_taskmill_json(dir.path(), &["select"]);
    assert_eq!(active.as_array().unwrap().len(), 0);
    let all = run_taskmill_json(dir.path(), &["select", "--archived"]);
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_json_patch_and_story_context() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);
    run_taskmill_ok(dir.path(), &["add", "Payments", "--type", "story"]);
    run_taskmill_ok(dir.path(), &["add", "Webhook handler", "--parent", "1"]);

    let story = run_taskmill_json(
        dir.path(),
        &[
            "update",
            "1",
            "--json",
            r#"{"shared_context":["use idempotency keys"],"meta":{"refined":true}}"#,
        ],
    );
    assert_eq!(story["meta"]["refined"], "true");

    let hits = run_taskmill_json(dir.path(), &["select", "--id", "2"]);
    assert_eq!(
        hits[0]["parent_shared_context"],
        serde_json::json!(["use idempotency keys"])
    );

    let shown = run_taskmill_json(dir.path(), &["show", "2"]);
    assert_eq!(shown["parent_id"], 1);
}

#[test]
fn test_cli_errors_use_json_envelope() {
    let dir = tempdir().unwrap();

    let err = run_taskmill_err_json(dir.path(), &["add", "too early"]);
    assert_eq!(err["error"], "not_initialized");

    run_taskmill_ok(dir.path(), &["init"]);
    let err = run_taskmill_err_json(dir.path(), &["init"]);
    assert_eq!(err["error"], "already_initialized");

    let err = run_taskmill_err_json(dir.path(), &["add", "orphan", "--parent", "99999"]);
    assert_eq!(err["error"], "parent_not_found");

    let err = run_taskmill_err_json(dir.path(), &["update", "1", "--json", r#"{"bogus":1}"#]);
    assert_eq!(err["error"], "validation_error");

    let err = run_taskmill_err_json(dir.path(), &["show", "42"]);
    assert_eq!(err["error"], "task_not_found");
}

#[test]
fn test_cli_complete_by_title_requires_unique_match() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);
    run_taskmill_ok(dir.path(), &["add", "Fix login bug"]);
    run_taskmill_ok(dir.path(), &["add", "Fix logout bug"]);

    let err = run_taskmill_err_json(dir.path(), &["complete", "fix", "--by-title"]);
    assert_eq!(err["error"], "ambiguous_match");

    let task = run_taskmill_json(dir.path(), &["delete", "LOGOUT"]);
    assert_eq!(task["id"], 2);
    assert_eq!(task["status"], "deleted");
}

#[test]
fn test_cli_execution_state_prefixes_context() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);
    run_taskmill_ok(dir.path(), &["add", "Story", "--type", "story"]);
    run_taskmill_ok(dir.path(), &["add", "Child", "--parent", "1"]);

    let state = run_taskmill_json(dir.path(), &["state", "set", "--story", "1", "--task", "2"]);
    assert_eq!(state["task_id"], 2);

    let story = run_taskmill_json(dir.path(), &["update", "1", "--context", "schema is v2"]);
    assert_eq!(story["shared_context"], serde_json::json!(["Task 2: schema is v2"]));

    let cleared = run_taskmill_json(dir.path(), &["state", "clear"]);
    assert_eq!(cleared["cleared"], true);
    let shown = run_taskmill_json(dir.path(), &["state", "show"]);
    assert!(shown.is_null());
}

#[test]
fn test_cli_sync_outside_git() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);
    let outcome = run_taskmill_json(dir.path(), &["sync"]);
    assert_eq!(outcome["outcome"], "not_a_repository");
}

#[test]
fn test_cli_project_flag_and_minimal_format() {
    let dir = tempdir().unwrap();
    let project = dir.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    let project_arg = project.to_str().unwrap();

    run_taskmill_ok(dir.path(), &["--project", project_arg, "init"]);
    run_taskmill_ok(dir.path(), &["--project", project_arg, "add", "Remote work"]);

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("taskmill"))
        .current_dir(dir.path())
        .env("TASKMILL_DIR", &project)
        .args(["--format", "minimal", "select"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote work"))
        .stdout(predicate::str::contains("TITLE"));
}

#[test]
fn test_cli_corrupt_store_exits_with_operational_status() {
    let dir = tempdir().unwrap();
    run_taskmill_ok(dir.path(), &["init"]);
    fs::write(dir.path().join(".taskmill").join("tasks.jsonl"), "{broken\n").unwrap();

    let output = run_taskmill(dir.path(), &["add", "anything"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err: Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(err["error"], "corrupt_store");
}
