//! One orchestration cycle: claim, dispatch, execute approvals, project.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use steward_core::paths::{claimed_ledger_path, dashboard_path, manifest_path};
use steward_core::store::atomic_write;
use steward_core::{
    ApprovalRequest, AuditEvent, AuditKind, AuditLog, Folder, KeyLedger, StoreError,
    StoreSnapshot, Task, TaskName, TaskStore,
};
use steward_renderer::{ApprovedPromptCtx, BatchPromptCtx, Projection, PromptTask, Renderer};

use crate::engine::{EngineOutput, EngineRequest, Manifest, ReasoningEngine};
use crate::error::{io_err, DaemonError};

/// What one cycle did. Names are listed in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: Vec<TaskName>,
    /// Claimed tasks archived because their identity was already handled.
    pub duplicates: Vec<TaskName>,
    /// Batch tasks the engine moved out of `In_Progress`.
    pub dispatched: Vec<TaskName>,
    /// Batch tasks still in `In_Progress` (or gone) after the engine ran.
    pub unresolved: Vec<TaskName>,
    /// Approved actions carried to their final folder.
    pub executed: Vec<TaskName>,
    pub engine_failures: usize,
    pub errors: usize,
    pub dashboard_written: bool,
}

impl CycleReport {
    /// Nothing was claimed, executed or reported.
    pub fn is_quiet(&self) -> bool {
        self.claimed.is_empty()
            && self.executed.is_empty()
            && self.engine_failures == 0
            && self.errors == 0
    }
}

pub struct Orchestrator<S: TaskStore, E: ReasoningEngine> {
    vault: PathBuf,
    store: S,
    engine: E,
    renderer: Renderer,
    audit: AuditLog,
    claimed: KeyLedger,
    claim_retention: Duration,
    recent_events: usize,
    /// Unreadable files already reported; each is reported once per process.
    reported: HashSet<(Folder, TaskName)>,
}

impl<S: TaskStore, E: ReasoningEngine> Orchestrator<S, E> {
    pub fn new(
        vault: &Path,
        store: S,
        engine: E,
        renderer: Renderer,
        recent_events: usize,
    ) -> Result<Self, DaemonError> {
        Ok(Self {
            vault: vault.to_path_buf(),
            store,
            engine,
            renderer,
            audit: AuditLog::for_vault(vault),
            claimed: KeyLedger::load(claimed_ledger_path(vault))?,
            claim_retention: Duration::days(30),
            recent_events,
            reported: HashSet::new(),
        })
    }

    /// Forget claimed identities older than `retention`; a task with an
    /// identity that old is treated as new again.
    pub fn with_claim_retention(mut self, retention: Duration) -> Self {
        self.claim_retention = retention;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Run one full cycle at `now`.
    ///
    /// Per-task problems become `error` audit events and never abort the
    /// cycle. An `Err` means the vault itself could not be read or the audit
    /// log could not be written.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, DaemonError> {
        let mut report = CycleReport::default();

        let batch = self.claim_phase(now, &mut report)?;
        if !batch.is_empty() {
            self.dispatch_batch(now, batch, &mut report)?;
        }
        self.approved_phase(now, &mut report)?;
        report.dashboard_written = refresh_dashboard(
            &self.vault,
            &self.store,
            &self.audit,
            &self.renderer,
            self.recent_events,
            now,
        )?;

        if !report.is_quiet() {
            info!(
                claimed = report.claimed.len(),
                duplicates = report.duplicates.len(),
                dispatched = report.dispatched.len(),
                executed = report.executed.len(),
                errors = report.errors,
                "cycle complete"
            );
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Claim
    // -----------------------------------------------------------------------

    fn claim_phase(
        &mut self,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<Vec<(TaskName, Task)>, DaemonError> {
        let pruned = self.claimed.prune_before(now - self.claim_retention);
        if pruned > 0 {
            debug!(pruned, "expired claimed identities");
        }
        let listed = self.store.list(Folder::NeedsAction)?;
        let mut batch = Vec::new();
        let mut ledger_dirty = pruned > 0;

        for name in listed {
            let Some(task) = self.read_or_report(now, Folder::NeedsAction, &name, report)? else {
                continue;
            };

            match self.store.move_task(&name, Folder::NeedsAction, Folder::InProgress) {
                Ok(()) => {}
                Err(StoreError::MoveConflict { .. }) => {
                    info!(task = %name, "claim lost to another actor");
                    continue;
                }
                Err(e) => {
                    self.record_error(now, &e, json!({ "task": name.as_str() }), report)?;
                    continue;
                }
            }
            self.audit.append(&AuditEvent::task_claimed(now, &name))?;
            report.claimed.push(name.clone());

            if let Some(identity) = task.header.source_identity.as_deref() {
                if self.claimed.contains(identity) {
                    self.archive_duplicate(now, &name, identity, report)?;
                    continue;
                }
                self.claimed.insert(identity, now);
                ledger_dirty = true;
            }
            batch.push((name, task));
        }

        if ledger_dirty {
            self.claimed.save()?;
        }
        Ok(batch)
    }

    fn archive_duplicate(
        &mut self,
        now: DateTime<Utc>,
        name: &TaskName,
        identity: &str,
        report: &mut CycleReport,
    ) -> Result<(), DaemonError> {
        match self.store.move_task(name, Folder::InProgress, Folder::Done) {
            Ok(()) => {
                info!(task = %name, identity, "duplicate identity archived");
                self.audit.append(&AuditEvent::task_transitioned(
                    now,
                    name,
                    Folder::InProgress,
                    Folder::Done,
                    Some("duplicate"),
                ))?;
                report.duplicates.push(name.clone());
                Ok(())
            }
            Err(e) => self.record_error(now, &e, json!({ "task": name.as_str() }), report),
        }
    }

    // -----------------------------------------------------------------------
    // Batch dispatch
    // -----------------------------------------------------------------------

    fn dispatch_batch(
        &mut self,
        now: DateTime<Utc>,
        batch: Vec<(TaskName, Task)>,
        report: &mut CycleReport,
    ) -> Result<(), DaemonError> {
        let tasks: Vec<PromptTask> = batch
            .iter()
            .map(|(name, task)| PromptTask::new(&self.store, Folder::InProgress, name, task))
            .collect();
        let names: Vec<&str> = batch.iter().map(|(n, _)| n.as_str()).collect();

        let ctx = BatchPromptCtx::new(&self.vault, &manifest_path(&self.vault), tasks.clone());
        let request = EngineRequest {
            prompt: self.renderer.render_batch_prompt(&ctx)?,
            manifest: Manifest::batch(&self.vault, tasks),
        };

        self.audit.append(&AuditEvent::new(
            AuditKind::EngineInvoked,
            now,
            json!({ "mode": "batch", "tasks": names }),
        ))?;

        let output = match self.engine.invoke(&request) {
            Ok(output) => output,
            Err(e) => {
                report.engine_failures += 1;
                return self.record_error(
                    now,
                    format!("engine invocation failed: {e}"),
                    json!({ "mode": "batch", "tasks": names }),
                    report,
                );
            }
        };
        log_output("batch", &output);
        let output_length = output.len();

        for (name, _) in &batch {
            match self.store.locate(name)? {
                Some(Folder::InProgress) => {
                    report.unresolved.push(name.clone());
                    self.record_error(
                        now,
                        "engine left task in In_Progress",
                        json!({ "task": name.as_str(), "output_length": output_length }),
                        report,
                    )?;
                }
                Some(to) => {
                    let mut event =
                        AuditEvent::task_transitioned(now, name, Folder::InProgress, to, None);
                    event.details["output_length"] = json!(output_length);
                    self.audit.append(&event)?;
                    report.dispatched.push(name.clone());
                }
                None => {
                    report.unresolved.push(name.clone());
                    self.record_error(
                        now,
                        "task missing after engine run",
                        json!({ "task": name.as_str(), "output_length": output_length }),
                        report,
                    )?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Approved actions
    // -----------------------------------------------------------------------

    fn approved_phase(
        &mut self,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), DaemonError> {
        for name in self.store.list(Folder::Approved)? {
            let Some(task) = self.read_or_report(now, Folder::Approved, &name, report)? else {
                continue;
            };
            let request = match ApprovalRequest::from_task(&name, &task) {
                Ok(request) => request,
                Err(e) => {
                    if self.reported.insert((Folder::Approved, name.clone())) {
                        self.record_error(now, &e, json!({ "task": name.as_str() }), report)?;
                    }
                    continue;
                }
            };
            self.execute_approved(now, &name, &task, &request, report)?;
        }
        Ok(())
    }

    fn execute_approved(
        &mut self,
        now: DateTime<Utc>,
        name: &TaskName,
        task: &Task,
        request: &ApprovalRequest,
        report: &mut CycleReport,
    ) -> Result<(), DaemonError> {
        let key = request.execution_key();
        let prompt_task = PromptTask::new(&self.store, Folder::Approved, name, task);
        let ctx = ApprovedPromptCtx::new(
            &self.vault,
            &manifest_path(&self.vault),
            prompt_task.clone(),
            request,
        )?;
        let engine_request = EngineRequest {
            prompt: self.renderer.render_approved_prompt(&ctx)?,
            manifest: Manifest::approved(&self.vault, prompt_task, key.clone()),
        };

        self.audit.append(&AuditEvent::new(
            AuditKind::EngineInvoked,
            now,
            json!({ "mode": "approved", "task": name.as_str(), "execution_key": key }),
        ))?;

        let output = match self.engine.invoke(&engine_request) {
            Ok(output) => output,
            Err(e) => {
                report.engine_failures += 1;
                return self.record_error(
                    now,
                    format!("approved action failed: {e}"),
                    json!({ "task": name.as_str(), "execution_key": key }),
                    report,
                );
            }
        };
        log_output("approved", &output);

        let to = match self.store.locate(name)? {
            Some(Folder::Approved) => {
                if let Err(e) = self.store.move_task(name, Folder::Approved, Folder::Done) {
                    return self.record_error(now, &e, json!({ "task": name.as_str() }), report);
                }
                Folder::Done
            }
            Some(to) => to,
            None => {
                return self.record_error(
                    now,
                    "approved task missing after engine run",
                    json!({ "task": name.as_str() }),
                    report,
                );
            }
        };
        let mut event = AuditEvent::task_transitioned(now, name, Folder::Approved, to, None);
        event.details["output_length"] = json!(output.len());
        self.audit.append(&event)?;
        report.executed.push(name.clone());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Read a task, turning an unreadable file into a one-time `error` event.
    /// `Ok(None)` means skip it.
    fn read_or_report(
        &mut self,
        now: DateTime<Utc>,
        folder: Folder,
        name: &TaskName,
        report: &mut CycleReport,
    ) -> Result<Option<Task>, DaemonError> {
        match self.store.read(folder, name) {
            Ok(task) => Ok(Some(task)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => {
                if self.reported.insert((folder, name.clone())) {
                    self.record_error(
                        now,
                        &e,
                        json!({ "task": name.as_str(), "folder": folder.dir_name() }),
                        report,
                    )?;
                } else {
                    debug!(task = %name, %folder, "still unreadable");
                }
                Ok(None)
            }
        }
    }

    fn record_error(
        &self,
        now: DateTime<Utc>,
        message: impl std::fmt::Display,
        details: serde_json::Value,
        report: &mut CycleReport,
    ) -> Result<(), DaemonError> {
        let message = message.to_string();
        warn!(%message, "cycle error");
        report.errors += 1;
        self.audit.append(&AuditEvent::error(now, message, details))?;
        Ok(())
    }
}

fn log_output(mode: &str, output: &EngineOutput) {
    if output.is_empty() {
        debug!(mode, "engine produced no output");
    } else {
        debug!(mode, output_length = output.len(), output = %output.tail(), "engine output");
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Recompute `Dashboard.md` from the store and the audit tail.
///
/// The last engine invocation is looked up across the whole log, so a busy
/// cycle that pushes it out of the recent tail still shows it.
///
/// Returns `true` when the file was rewritten; identical bytes leave it untouched.
pub fn refresh_dashboard(
    vault: &Path,
    store: &impl TaskStore,
    audit: &AuditLog,
    renderer: &Renderer,
    recent_events: usize,
    now: DateTime<Utc>,
) -> Result<bool, DaemonError> {
    let snapshot = StoreSnapshot::capture(store, now)?;
    let events = audit.tail(recent_events)?;
    let last_engine = audit.last_of(AuditKind::EngineInvoked)?;
    let projection = Projection::recompute(&snapshot, &events)
        .with_last_engine_invoked(last_engine.map(|e| e.timestamp));
    let rendered = renderer.render_dashboard(&projection)?;

    let path = dashboard_path(vault);
    let current = match fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_err(&path, e)),
    };
    if current.as_deref() == Some(rendered.as_bytes()) {
        debug!("dashboard unchanged");
        return Ok(false);
    }
    atomic_write(&path, rendered.as_bytes())?;
    Ok(true)
}
