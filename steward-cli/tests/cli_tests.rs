use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use predicates::str::contains;

fn steward() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("steward"));
    cmd.env("NO_COLOR", "1").env("RUST_LOG", "warn");
    cmd
}

fn names_in(vault: &Path, folder: &str) -> Vec<String> {
    let dir = vault.join(folder);
    if !dir.is_dir() {
        return vec![];
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".md") && !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[test]
fn missing_vault_exits_non_zero() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("no-such-vault");

    steward()
        .arg("run")
        .arg(&missing)
        .arg("--once")
        .assert()
        .failure()
        .stderr(contains("cannot open vault"));

    steward()
        .arg("status")
        .arg(&missing)
        .assert()
        .failure();
}

#[test]
fn malformed_config_is_a_startup_error() {
    let vault = TempDir::new().unwrap();
    vault
        .child(".steward/config.yaml")
        .write_str("check_interval_secs: [not, a, number]\n")
        .unwrap();

    steward()
        .arg("run")
        .arg(vault.path())
        .arg("--once")
        .assert()
        .failure()
        .stderr(contains("config.yaml"));
}

#[test]
fn run_once_on_empty_vault_writes_dashboard() {
    let vault = TempDir::new().unwrap();

    steward()
        .arg("run")
        .arg(vault.path())
        .args(["--once", "--engine", "steward-engine-never-called"])
        .assert()
        .success();

    vault.child("Dashboard.md").assert(contains("| Needs_Action | 0 |"));
    for folder in [
        "Needs_Action",
        "In_Progress",
        "Pending_Approval",
        "Approved",
        "Rejected",
        "Done",
        "Plans",
    ] {
        assert!(vault.path().join(folder).is_dir(), "{folder} missing");
    }
}

#[cfg(unix)]
#[test]
fn watch_then_run_moves_a_dropped_file_to_done() {
    let vault = TempDir::new().unwrap();
    vault.child("Inbox/contract.pdf").write_str("signed").unwrap();

    steward()
        .arg("watch")
        .arg(vault.path())
        .arg("--once")
        .assert()
        .success();
    assert_eq!(names_in(vault.path(), "Needs_Action").len(), 1);

    steward()
        .arg("run")
        .arg(vault.path())
        .args([
            "--once",
            "--engine",
            "sh",
            "--engine-arg",
            "-c",
            "--engine-arg",
            "mv In_Progress/*.md Done/",
        ])
        .assert()
        .success();

    assert!(names_in(vault.path(), "Needs_Action").is_empty());
    assert_eq!(names_in(vault.path(), "Done").len(), 1);
    vault.child(".steward/last_prompt.md").assert(contains("contract"));
    vault.child("Dashboard.md").assert(contains("| Done | 1 |"));

    let log_dir = vault.path().join("Logs");
    let log = fs::read_dir(&log_dir).unwrap().next().unwrap().unwrap().path();
    let text = fs::read_to_string(log).unwrap();
    for event in ["task_enqueued", "task_claimed", "engine_invoked", "task_transitioned"] {
        assert!(text.contains(event), "{event} missing from audit log");
    }
}

#[test]
fn approval_create_approve_and_list() {
    let vault = TempDir::new().unwrap();

    steward()
        .args(["approval", "create"])
        .arg(vault.path())
        .args([
            "--type",
            "email_send",
            "--action",
            "reply",
            "--payload",
            r#"{"to":"client@example.com"}"#,
            "--description",
            "Send the invoice reply",
        ])
        .assert()
        .success()
        .stdout(contains("created"));

    let pending = names_in(vault.path(), "Pending_Approval");
    assert_eq!(pending.len(), 1);
    let name = &pending[0];
    vault
        .child(format!("Pending_Approval/{name}"))
        .assert(contains("type: approval_request").and(contains("# Approval Required: email_send")));

    steward()
        .args(["approval", "list"])
        .arg(vault.path())
        .assert()
        .success()
        .stdout(contains(name.as_str()).and(contains("pending")));

    steward()
        .args(["approval", "approve"])
        .arg(vault.path())
        .arg(name)
        .assert()
        .success();
    assert_eq!(names_in(vault.path(), "Approved"), vec![name.clone()]);
    vault
        .child(format!("Approved/{name}"))
        .assert(contains("status: approved"));

    steward()
        .args(["approval", "check"])
        .arg(vault.path())
        .arg(name)
        .assert()
        .success()
        .stdout(contains("Approved"));
}

fn audit_lines(vault: &Path) -> Vec<String> {
    let dir = vault.join("Logs");
    if !dir.is_dir() {
        return vec![];
    }
    let mut lines = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|e| e == "jsonl") {
            lines.extend(fs::read_to_string(path).unwrap().lines().map(str::to_string));
        }
    }
    lines
}

#[test]
fn approval_create_records_task_enqueued() {
    let vault = TempDir::new().unwrap();
    steward()
        .args(["approval", "create"])
        .arg(vault.path())
        .args(["--type", "payment", "--payload", r#"{"amount":120}"#])
        .assert()
        .success();

    let name = names_in(vault.path(), "Pending_Approval").remove(0);
    let lines = audit_lines(vault.path());
    assert_eq!(lines.len(), 1);
    let event: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(event["event"], "task_enqueued");
    assert_eq!(event["details"]["task"], name.as_str());
    assert_eq!(event["details"]["folder"], "Pending_Approval");
    assert_eq!(event["details"]["execution_key"].as_str().unwrap().len(), 64);
}

#[test]
fn approving_an_unknown_request_fails() {
    let vault = TempDir::new().unwrap();
    steward()
        .args(["approval", "approve"])
        .arg(vault.path())
        .arg("20260101T000000Z_approval_request_ghost.md")
        .assert()
        .failure()
        .stderr(contains("cannot approve"));
}

#[test]
fn plan_lifecycle() {
    let vault = TempDir::new().unwrap();

    steward()
        .args(["plan", "create"])
        .arg(vault.path())
        .args([
            "--objective",
            "Onboard new client",
            "--step",
            "Send welcome email",
            "--step",
            "Schedule kickoff",
        ])
        .assert()
        .success();
    let plans = names_in(vault.path(), "Plans");
    assert_eq!(plans.len(), 1);
    let name = &plans[0];
    vault
        .child(format!("Plans/{name}"))
        .assert(contains("- [ ] 1. Send welcome email").and(contains("- [ ] 2. Schedule kickoff")));

    steward()
        .args(["plan", "update"])
        .arg(vault.path())
        .args([name.as_str(), "1", "--note", "sent at 9am"])
        .assert()
        .success()
        .stdout(contains("1/2"));
    vault
        .child(format!("Plans/{name}"))
        .assert(contains("- [x] 1. Send welcome email").and(contains("*Note: sent at 9am*")));

    steward()
        .args(["plan", "status"])
        .arg(vault.path())
        .arg(name)
        .assert()
        .success()
        .stdout(contains("Schedule kickoff").and(contains("not_started")));

    steward()
        .args(["plan", "complete"])
        .arg(vault.path())
        .arg(name)
        .assert()
        .success();
    assert!(names_in(vault.path(), "Plans").is_empty());
    vault
        .child(format!("Done/{name}"))
        .assert(contains("status: completed"));
}

#[test]
fn plan_create_sets_priority_and_list_filters_by_status() {
    let vault = TempDir::new().unwrap();

    steward()
        .args(["plan", "create"])
        .arg(vault.path())
        .args(["--objective", "Close Q3 books", "--step", "Reconcile", "--priority", "high"])
        .assert()
        .success();
    let name = names_in(vault.path(), "Plans").remove(0);
    vault
        .child(format!("Plans/{name}"))
        .assert(contains("status: in_progress").and(contains("priority: high")));
    assert!(audit_lines(vault.path())
        .iter()
        .any(|l| l.contains("task_enqueued") && l.contains(name.as_str())));

    steward()
        .args(["plan", "list"])
        .arg(vault.path())
        .args(["--status", "in_progress"])
        .assert()
        .success()
        .stdout(contains(name.as_str()));

    steward()
        .args(["plan", "list"])
        .arg(vault.path())
        .args(["--status", "completed"])
        .assert()
        .success()
        .stdout(contains("no plans"));
}

#[test]
fn status_json_reports_counts() {
    let vault = TempDir::new().unwrap();
    vault
        .child("Needs_Action/broken.md")
        .write_str("not a task")
        .unwrap();

    let output = steward()
        .arg("status")
        .arg(vault.path())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["corrupt"][0], "Needs_Action/broken.md");
    assert_eq!(json["counts"][0]["folder"], "Needs_Action");
    assert_eq!(json["counts"][0]["count"], 1);
}
