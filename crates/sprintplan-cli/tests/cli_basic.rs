//! Basic CLI E2E tests.
//!
//! Each test drives the compiled binary against its own temporary data
//! directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_sprintplan"))
        .args(args)
        .env("SPRINTPLAN_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    stdout
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let stdout = run_ok(data_dir, args);
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn seed_lambda_tickets(dir: &Path) {
    run_ok(
        dir,
        &[
            "ticket", "add", "OPS-1", "--title", "Lambda runtime", "--points", "2",
            "--tag", "aws.lambda", "--tag", "prod", "--due", "2024-01-03",
        ],
    );
    run_ok(
        dir,
        &[
            "ticket", "add", "OPS-2", "--title", "Lambda alarms", "--points", "1",
            "--tag", "AWS Lambda", "--tag", "production",
        ],
    );
    run_ok(dir, &["ticket", "decompose", "OPS-1"]);
    run_ok(dir, &["ticket", "decompose", "OPS-2"]);
}

#[test]
fn test_ticket_add_and_list() {
    let dir = TempDir::new().unwrap();
    let out = run_ok(dir.path(), &["ticket", "add", "NET-1", "--title", "Ingress cert"]);
    assert!(out.contains("Ticket saved: NET-1"));

    let tickets = run_json(dir.path(), &["ticket", "list", "--json"]);
    let tickets = tickets.as_array().unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0]["id"], "NET-1");
    assert_eq!(tickets[0]["story_points"], 1);
}

#[test]
fn test_decompose_creates_items_by_points() {
    let dir = TempDir::new().unwrap();
    run_ok(
        dir.path(),
        &["ticket", "add", "OPS-9", "--title", "Rotate keys", "--points", "3", "--tag", "aws.kms"],
    );
    let items = run_json(dir.path(), &["ticket", "decompose", "OPS-9", "--json"]);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["seq"], 1);
    assert_eq!(items[0]["tags"][0], "aws.kms");
}

#[test]
fn test_decompose_unknown_ticket_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["ticket", "decompose", "NOPE-1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_item_status_updates_count() {
    let dir = TempDir::new().unwrap();
    seed_lambda_tickets(dir.path());

    let items = run_json(dir.path(), &["item", "list", "--ticket", "OPS-1", "--json"]);
    let ids: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);

    let out = run_ok(dir.path(), &["item", "status", "done", ids[0], ids[1], "missing"]);
    assert!(out.contains("Updated 2 work item(s)"));

    let done = run_json(dir.path(), &["item", "list", "--status", "done", "--json"]);
    assert_eq!(done.as_array().unwrap().len(), 2);
}

#[test]
fn test_item_status_rejects_unknown_status() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["item", "status", "someday", "x"]);
    assert_ne!(code, 0);
}

#[test]
fn test_plan_evening_round_trip() {
    let dir = TempDir::new().unwrap();
    seed_lambda_tickets(dir.path());

    let groups = run_json(dir.path(), &["affinity", "compute", "--json"]);
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["key"], "aws.lambda:prod");

    let stored = run_json(
        dir.path(),
        &["plan", "make", "--start", "2024-01-01", "--days", "2", "--json"],
    );
    let blocks = stored["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0]["note"], "aws.lambda:prod");
    assert_eq!(blocks[0]["item_ids"].as_array().unwrap().len(), 3);

    let report = run_json(
        dir.path(),
        &["report", "morning", "--date", "2024-01-01", "--json"],
    );
    assert_eq!(report["checklist"].as_array().unwrap().len(), 3);

    let first = blocks[0]["item_ids"][0].as_str().unwrap().to_string();
    let outcome = run_json(
        dir.path(),
        &["evening", "--date", "2024-01-01", "--completed", &first, "--json"],
    );
    assert_eq!(outcome["target_day"], "2024-01-02");
    assert_eq!(outcome["status_updates"], 1);
    assert_eq!(outcome["plan_delta"][0]["item_ids"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["notes"][0], "Carried 2 work item(s) to 2024-01-02.");
}

#[test]
fn test_evening_conflicting_outcomes_fail() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["evening", "--date", "2024-01-01", "--completed", "a", "--partial", "a"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_plan_make_with_empty_backlog() {
    let dir = TempDir::new().unwrap();
    let out = run_ok(dir.path(), &["plan", "make", "--start", "2024-01-01"]);
    assert!(out.contains("Nothing to plan"));
}

#[test]
fn test_config_get_and_set() {
    let dir = TempDir::new().unwrap();
    assert_eq!(run_ok(dir.path(), &["config", "get", "planner.horizon_days"]).trim(), "5");

    run_ok(dir.path(), &["config", "set", "planner.horizon_days", "3"]);
    assert_eq!(run_ok(dir.path(), &["config", "get", "planner.horizon_days"]).trim(), "3");
    assert!(dir.path().join("config.toml").exists());

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "planner.horizon_days", "0"]);
    assert_eq!(code, 1);
    let (_, _, code) = run_cli(dir.path(), &["config", "get", "planner.nope"]);
    assert_eq!(code, 1);

    run_ok(dir.path(), &["config", "reset"]);
    assert_eq!(run_ok(dir.path(), &["config", "get", "planner.horizon_days"]).trim(), "5");
}
