//! Approval requests and the human side of the approval workflow.
//!
//! Expiry is lazy: an expired request stays in `Pending_Approval` and is only
//! *reported* as expired. Approving it is refused; rejecting it is allowed.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::ApprovalError;
use crate::state::Folder;
use crate::store::TaskStore;
use crate::task::{Task, TaskDetail};
use crate::types::{Priority, TaskKind, TaskName, TaskStatus};

/// Default lifetime of a new request.
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

/// Typed view over an `approval_request` task.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub name: TaskName,
    pub action_type: String,
    pub action: Option<String>,
    pub action_payload: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub priority: Priority,
}

impl ApprovalRequest {
    pub fn from_task(name: &TaskName, task: &Task) -> Result<Self, ApprovalError> {
        match &task.header.detail {
            TaskDetail::ApprovalRequest {
                action_type,
                action,
                action_payload,
                expires_at,
            } => Ok(Self {
                name: name.clone(),
                action_type: action_type.clone(),
                action: action.clone(),
                action_payload: action_payload.clone(),
                created_at: task.header.created_at,
                expires_at: *expires_at,
                priority: task.header.priority,
            }),
            other => Err(ApprovalError::NotAnApproval(other.kind().to_string())),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as seen by a reader at `now`, given the folder the file is in.
    pub fn effective_status(&self, folder: Folder, now: DateTime<Utc>) -> TaskStatus {
        match folder {
            Folder::PendingApproval if self.is_expired(now) => TaskStatus::Expired,
            Folder::Approved => TaskStatus::Approved,
            Folder::Rejected => TaskStatus::Rejected,
            Folder::Done => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }

    /// Idempotence key for executing this request; see [`execution_key`].
    pub fn execution_key(&self) -> String {
        execution_key(&self.name, &self.action_payload)
    }
}

/// `hex(sha256(name ‖ canonical JSON of payload))`.
///
/// Stable across retries of the same approved action, so an engine can refuse
/// to perform an action twice.
pub fn execution_key(name: &TaskName, payload: &Value) -> String {
    let mut h = Sha256::new();
    h.update(name.as_str().as_bytes());
    h.update(canonical_json(payload).as_bytes());
    hex::encode(h.finalize())
}

/// JSON text with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::from(k.as_str()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Parameters for a new approval request.
#[derive(Debug, Clone)]
pub struct NewApproval {
    pub action_type: String,
    pub action: Option<String>,
    pub action_payload: Value,
    pub description: String,
    pub ttl: Duration,
    pub priority: Priority,
}

/// Build the task for a new request; the caller renders/overrides the body if needed.
///
/// A non-empty description is also kept in the header so tools can show it
/// without parsing the body.
pub fn new_request(params: &NewApproval, now: DateTime<Utc>, body: String) -> (TaskName, Task) {
    let slug = params.action.as_deref().unwrap_or(&params.action_type);
    let name = TaskName::generate(now, TaskKind::ApprovalRequest, slug, None);
    let mut task = Task::new(
        TaskDetail::ApprovalRequest {
            action_type: params.action_type.clone(),
            action: params.action.clone(),
            action_payload: params.action_payload.clone(),
            expires_at: now + params.ttl,
        },
        now,
        body,
    )
    .with_priority(params.priority);
    let description = params.description.trim();
    if !description.is_empty() {
        task = task.with_extra("description", description);
    }
    (name, task)
}

/// Move a pending request to `Approved`. Expired requests are refused and left in place.
pub fn approve(
    store: &impl TaskStore,
    name: &TaskName,
    now: DateTime<Utc>,
) -> Result<ApprovalRequest, ApprovalError> {
    let task = store.read(Folder::PendingApproval, name)?;
    let request = ApprovalRequest::from_task(name, &task)?;
    if request.is_expired(now) {
        return Err(ApprovalError::Expired {
            name: name.clone(),
            expired_at: request.expires_at,
        });
    }
    resolve(store, name, task, Folder::Approved, TaskStatus::Approved)?;
    info!(task = %name, "approval granted");
    Ok(request)
}

/// Move a pending (or expired) request to `Rejected`.
pub fn reject(store: &impl TaskStore, name: &TaskName) -> Result<ApprovalRequest, ApprovalError> {
    let task = store.read(Folder::PendingApproval, name)?;
    let request = ApprovalRequest::from_task(name, &task)?;
    resolve(store, name, task, Folder::Rejected, TaskStatus::Rejected)?;
    info!(task = %name, "approval rejected");
    Ok(request)
}

/// The status is written while the file is still pending, then the move
/// publishes the decision in one step. Once the file lands in `to` it belongs
/// to whoever processes that folder and is never written again here.
///
/// If the move fails the pending file keeps the new status; readers derive
/// the effective status from the folder, so it still reads as pending.
fn resolve(
    store: &impl TaskStore,
    name: &TaskName,
    task: Task,
    to: Folder,
    status: TaskStatus,
) -> Result<(), ApprovalError> {
    store.write(Folder::PendingApproval, name, &task.with_status(status))?;
    store.move_task(name, Folder::PendingApproval, to)?;
    Ok(())
}

/// Every approval request in `folder` with its effective status at `now`.
///
/// Files that are not approval requests are skipped; corrupt files surface as errors.
pub fn list_requests(
    store: &impl TaskStore,
    folder: Folder,
    now: DateTime<Utc>,
) -> Result<Vec<(ApprovalRequest, TaskStatus)>, ApprovalError> {
    let mut out = Vec::new();
    for name in store.list(folder)? {
        let task = store.read(folder, &name)?;
        if task.kind() != TaskKind::ApprovalRequest {
            continue;
        }
        let request = ApprovalRequest::from_task(&name, &task)?;
        let status = request.effective_status(folder, now);
        out.push((request, status));
    }
    Ok(out)
}
