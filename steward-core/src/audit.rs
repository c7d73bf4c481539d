//! Append-only audit log, partitioned by UTC calendar day.
//!
//! Each event is one JSON line in `Logs/<YYYY-MM-DD>.jsonl`:
//!
//! ```text
//! {"timestamp":"2026-01-05T10:30:00Z","event":"task_claimed","details":{"task":"20260105T103000Z_file_drop_invoice_ab12cd34.md","from":"Needs_Action","to":"In_Progress"}}
//! ```
//!
//! No API exists to rewrite or remove a line.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::AuditError;
use crate::paths;
use crate::state::Folder;
use crate::types::TaskName;

/// Audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    TaskEnqueued,
    TaskClaimed,
    EngineInvoked,
    TaskTransitioned,
    Error,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::TaskEnqueued => "task_enqueued",
            AuditKind::TaskClaimed => "task_claimed",
            AuditKind::EngineInvoked => "engine_invoked",
            AuditKind::TaskTransitioned => "task_transitioned",
            AuditKind::Error => "error",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event: AuditKind,
    #[serde(default)]
    pub details: Value,
}

impl AuditEvent {
    pub fn new(event: AuditKind, timestamp: DateTime<Utc>, details: Value) -> Self {
        Self {
            timestamp,
            event,
            details,
        }
    }

    pub fn task_enqueued(now: DateTime<Utc>, name: &TaskName, watcher: &str, key: &str) -> Self {
        Self::new(
            AuditKind::TaskEnqueued,
            now,
            json!({
                "task": name.as_str(),
                "folder": Folder::NeedsAction.dir_name(),
                "watcher": watcher,
                "source_identity": key,
            }),
        )
    }

    pub fn task_claimed(now: DateTime<Utc>, name: &TaskName) -> Self {
        Self::new(
            AuditKind::TaskClaimed,
            now,
            json!({
                "task": name.as_str(),
                "from": Folder::NeedsAction.dir_name(),
                "to": Folder::InProgress.dir_name(),
            }),
        )
    }

    pub fn task_transitioned(
        now: DateTime<Utc>,
        name: &TaskName,
        from: Folder,
        to: Folder,
        reason: Option<&str>,
    ) -> Self {
        let mut details = json!({
            "task": name.as_str(),
            "from": from.dir_name(),
            "to": to.dir_name(),
        });
        if let Some(reason) = reason {
            details["reason"] = Value::from(reason);
        }
        Self::new(AuditKind::TaskTransitioned, now, details)
    }

    pub fn error(now: DateTime<Utc>, message: impl fmt::Display, details: Value) -> Self {
        let mut details = match details {
            Value::Object(map) => Value::Object(map),
            Value::Null => json!({}),
            other => json!({ "context": other }),
        };
        details["message"] = Value::from(message.to_string());
        Self::new(AuditKind::Error, now, details)
    }

    /// Task name carried in `details.task`, when present.
    pub fn task(&self) -> Option<&str> {
        self.details.get("task").and_then(Value::as_str)
    }
}

/// Handle on a vault's `Logs/` directory.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Audit log of the vault at `vault_root`.
    pub fn for_vault(vault_root: &Path) -> Self {
        Self {
            dir: paths::logs_dir(vault_root),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(paths::log_partition_file(day))
    }

    /// Append one event as a single complete line, durable before returning.
    pub fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let path = self.partition(event.timestamp.date_naive());
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        fs::create_dir_all(&self.dir).map_err(|e| audit_io(&self.dir, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| audit_io(&path, e))?;
        file.write_all(&line).map_err(|e| audit_io(&path, e))?;
        file.flush().map_err(|e| audit_io(&path, e))?;
        file.sync_data().map_err(|e| audit_io(&path, e))?;
        Ok(())
    }

    /// All events of one UTC day, in append order.
    pub fn read_day(&self, day: NaiveDate) -> Result<Vec<AuditEvent>, AuditError> {
        read_partition(&self.partition(day))
    }

    /// The last `n` events across partitions, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEvent>, AuditError> {
        if n == 0 {
            return Ok(vec![]);
        }
        let mut partitions = self.partitions()?;
        partitions.sort();

        let mut collected: Vec<AuditEvent> = Vec::new();
        for path in partitions.iter().rev() {
            let mut events = read_partition(path)?;
            events.append(&mut collected);
            collected = events;
            if collected.len() >= n {
                break;
            }
        }
        let skip = collected.len().saturating_sub(n);
        Ok(collected.split_off(skip))
    }

    /// Most recent event of `kind` in any partition.
    pub fn last_of(&self, kind: AuditKind) -> Result<Option<AuditEvent>, AuditError> {
        let mut partitions = self.partitions()?;
        partitions.sort();
        for path in partitions.iter().rev() {
            if let Some(event) = read_partition(path)?.into_iter().rev().find(|e| e.event == kind) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn partitions(&self) -> Result<Vec<PathBuf>, AuditError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(audit_io(&self.dir, e)),
        };
        Ok(entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect())
    }
}

fn read_partition(path: &Path) -> Result<Vec<AuditEvent>, AuditError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(audit_io(path, e)),
    };
    let mut events = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!(
                path = %path.display(),
                line = lineno + 1,
                error = %e,
                "skipping malformed audit line"
            ),
        }
    }
    Ok(events)
}

fn audit_io(path: &Path, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.to_path_buf(),
        source,
    }
}
