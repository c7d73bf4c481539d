//! Serializable payloads for the engine prompts and task body templates.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use steward_core::task::format_timestamp;
use steward_core::{ApprovalRequest, Folder, Task, TaskName, TaskStore};

/// One task as listed in a batch prompt / manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptTask {
    pub name: String,
    pub kind: String,
    pub priority: String,
    pub folder: String,
    pub path: String,
    pub source_identity: Option<String>,
}

impl PromptTask {
    pub fn new(store: &impl TaskStore, folder: Folder, name: &TaskName, task: &Task) -> Self {
        Self {
            name: name.to_string(),
            kind: task.kind().to_string(),
            priority: task.header.priority.to_string(),
            folder: folder.dir_name().to_string(),
            path: store.task_path(folder, name).display().to_string(),
            source_identity: task.header.source_identity.clone(),
        }
    }
}

/// Instruction for processing a freshly claimed batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPromptCtx {
    pub vault: String,
    pub manifest: String,
    pub tasks: Vec<PromptTask>,
}

impl BatchPromptCtx {
    pub fn new(vault: &Path, manifest: &Path, tasks: Vec<PromptTask>) -> Self {
        Self {
            vault: vault.display().to_string(),
            manifest: manifest.display().to_string(),
            tasks,
        }
    }
}

/// Instruction for executing one approved action.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedPromptCtx {
    pub vault: String,
    pub manifest: String,
    pub task: PromptTask,
    pub action_type: String,
    pub action: Option<String>,
    pub action_payload: String,
    pub execution_key: String,
}

impl ApprovedPromptCtx {
    pub fn new(
        vault: &Path,
        manifest: &Path,
        task: PromptTask,
        request: &ApprovalRequest,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            vault: vault.display().to_string(),
            manifest: manifest.display().to_string(),
            task,
            action_type: request.action_type.clone(),
            action: request.action.clone(),
            action_payload: serde_json::to_string_pretty(&request.action_payload)?,
            execution_key: request.execution_key(),
        })
    }
}

/// Body of a file-drop task.
#[derive(Debug, Clone, Serialize)]
pub struct FileDropCtx {
    pub source_file: String,
    pub file_type: String,
    pub file_size: u64,
    pub received: String,
}

impl FileDropCtx {
    pub fn new(source_file: &str, file_size: u64, received: DateTime<Utc>) -> Self {
        let file_type = Path::new(source_file)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            source_file: source_file.to_string(),
            file_type,
            file_size,
            received: format_timestamp(received),
        }
    }
}

/// Body of an approval request.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalBodyCtx {
    pub action_type: String,
    pub action: Option<String>,
    pub description: String,
    pub action_payload: String,
    pub expires_at: String,
}

/// Body of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanBodyCtx {
    pub objective: String,
    pub checklist: String,
    pub source_task: Option<String>,
}
