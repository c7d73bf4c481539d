//! Audit log integration tests.

use assert_fs::prelude::*;
use chrono::{Duration, TimeZone, Utc};
use predicates::prelude::*;
use serde_json::json;
use steward_core::{AuditEvent, AuditKind, AuditLog, Folder, TaskName};

#[test]
fn appends_only_ever_extend_the_partition() {
    let vault = assert_fs::TempDir::new().unwrap();
    let log = AuditLog::for_vault(vault.path());
    let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    let partition = vault.child("Logs/2026-01-05.jsonl");

    let mut previous = String::new();
    for i in 0..5 {
        let name = TaskName::from(format!("{i}.md"));
        let ts = start + Duration::seconds(i);
        log.append(&AuditEvent::task_claimed(ts, &name)).unwrap();
        log.append(&AuditEvent::task_transitioned(
            ts,
            &name,
            Folder::InProgress,
            Folder::Done,
            Some("duplicate"),
        ))
        .unwrap();

        let current = std::fs::read_to_string(partition.path()).unwrap();
        assert!(current.starts_with(&previous), "earlier lines were rewritten");
        assert!(current.ends_with('\n'));
        previous = current;
    }
    assert_eq!(previous.lines().count(), 10);
}

#[test]
fn events_land_in_their_utc_day() {
    let vault = assert_fs::TempDir::new().unwrap();
    let log = AuditLog::for_vault(vault.path());
    let late = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap();
    log.append(&AuditEvent::error(late, "boom", json!({})))
        .unwrap();
    log.append(&AuditEvent::error(late + Duration::seconds(1), "boom", json!({})))
        .unwrap();

    vault
        .child("Logs/2026-01-05.jsonl")
        .assert(predicate::str::contains("\"event\":\"error\""));
    vault
        .child("Logs/2026-01-06.jsonl")
        .assert(predicate::path::exists());

    let tail = log.tail(10).unwrap();
    assert_eq!(tail.len(), 2);
    assert!(tail.iter().all(|e| e.event == AuditKind::Error));
    assert!(tail[0].timestamp < tail[1].timestamp);
}

#[test]
fn event_lines_have_the_documented_shape() {
    let vault = assert_fs::TempDir::new().unwrap();
    let log = AuditLog::for_vault(vault.path());
    let ts = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    log.append(&AuditEvent::task_enqueued(
        ts,
        &"a.md".into(),
        "file_drop",
        "file_drop:abc",
    ))
    .unwrap();

    let raw = std::fs::read_to_string(vault.child("Logs/2026-01-05.jsonl").path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.trim_end()).unwrap();
    assert_eq!(value["event"], "task_enqueued");
    assert_eq!(value["details"]["task"], "a.md");
    assert_eq!(value["details"]["source_identity"], "file_drop:abc");
    assert!(value["timestamp"].as_str().unwrap().starts_with("2026-01-05T09:00:00"));
}
