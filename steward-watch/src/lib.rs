//! Watchers for `steward-watch`.
//!
//! A watcher turns external events into tasks in `Needs_Action`. Every watcher
//! implements [`Watcher`]; [`poll_once`] drives one detection pass and owns
//! the at-most-once guarantee: a key is only recorded in the ledger after its
//! task file and audit event are durable, and a recorded key is never enqueued
//! again.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use steward_core::{
    AuditError, AuditEvent, AuditLog, Folder, KeyLedger, LedgerError, StoreError, Task, TaskName,
    TaskStore,
};
use steward_renderer::RenderError;

pub mod file_drop;

pub use file_drop::{DroppedFile, FileDropWatcher};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from watcher detection and enqueueing.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Capability every input-detection agent provides.
pub trait Watcher {
    /// One detected external event.
    type Item;

    /// Stable watcher name; names its ledger file and appears in audit events.
    fn name(&self) -> &str;

    /// Everything currently observable, already-enqueued items included.
    fn detect(&self) -> Result<impl Iterator<Item = Self::Item> + '_, WatchError>;

    /// Identity of an item. Equal keys mean the same external event.
    fn dedupe_key(&self, item: &Self::Item) -> String;

    /// Build the task for an item. The task's `source_identity` must equal
    /// [`Watcher::dedupe_key`].
    fn to_task(
        &self,
        item: &Self::Item,
        now: DateTime<Utc>,
    ) -> Result<(TaskName, Task), WatchError>;
}

/// Outcome of one [`poll_once`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub detected: usize,
    pub enqueued: Vec<TaskName>,
    pub skipped: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Poll cycle
// ---------------------------------------------------------------------------

/// Run one detection pass: enqueue every item whose key is not yet in `ledger`.
///
/// Per item: write task → append `task_enqueued` → record key → save ledger.
/// An item that fails before its key is saved is retried on the next pass.
pub fn poll_once<W: Watcher>(
    watcher: &W,
    store: &impl TaskStore,
    ledger: &mut KeyLedger,
    audit: &AuditLog,
    now: DateTime<Utc>,
) -> Result<PollReport, WatchError> {
    let mut report = PollReport::default();

    for item in watcher.detect()? {
        report.detected += 1;
        let key = watcher.dedupe_key(&item);
        if ledger.contains(&key) {
            debug!(watcher = watcher.name(), %key, "already enqueued");
            report.skipped += 1;
            continue;
        }

        match enqueue(watcher, store, audit, &item, &key, now) {
            Ok(name) => {
                ledger.insert(key, now);
                ledger.save()?;
                info!(watcher = watcher.name(), task = %name, "task enqueued");
                report.enqueued.push(name);
            }
            Err(e) => {
                warn!(watcher = watcher.name(), %key, error = %e, "failed to enqueue item");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

fn enqueue<W: Watcher>(
    watcher: &W,
    store: &impl TaskStore,
    audit: &AuditLog,
    item: &W::Item,
    key: &str,
    now: DateTime<Utc>,
) -> Result<TaskName, WatchError> {
    let (name, mut task) = watcher.to_task(item, now)?;
    if task.header.source_identity.as_deref() != Some(key) {
        task.header.source_identity = Some(key.to_string());
    }
    store.write(Folder::NeedsAction, &name, &task)?;
    audit.append(&AuditEvent::task_enqueued(now, &name, watcher.name(), key))?;
    Ok(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
