//! Error types for steward-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::state::Folder;
use crate::types::TaskName;

/// Failures while decoding a task file (front-matter header + body).
#[derive(Debug, Error)]
pub enum TaskFormatError {
    /// The file does not start with a `---` delimited header block.
    #[error("missing front-matter header")]
    MissingHeader,

    /// The header block is not valid YAML, or a typed field failed to parse.
    #[error("invalid header YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A field required by the task's `type` is absent.
    #[error("missing required field `{field}` for type `{kind}`")]
    MissingField { kind: String, field: &'static str },

    /// A field is present but its value cannot be interpreted.
    #[error("invalid value for `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },

    /// The `type` key names a variant steward does not know.
    #[error("unknown task type `{0}`")]
    UnknownType(String),
}

/// All errors that can arise from task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The vault root does not exist or is not a directory.
    #[error("vault not found at {path}")]
    VaultMissing { path: PathBuf },

    /// No task with that name lives in the folder.
    #[error("task {name} not found in {folder}")]
    NotFound { folder: Folder, name: TaskName },

    /// The task file exists but cannot be decoded.
    #[error("corrupt task record at {path}: {source}")]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: TaskFormatError,
    },

    /// The destination already holds a file with the same name, or another
    /// actor moved the source first.
    #[error("move conflict for {name}: {from} -> {to}")]
    MoveConflict {
        name: TaskName,
        from: Folder,
        to: Folder,
    },

    /// The move is not an edge of the state machine.
    #[error("illegal transition for {name}: {from} -> {to}")]
    IllegalTransition {
        name: TaskName,
        from: Folder,
        to: Folder,
    },

    /// Task names must be plain `.md` file names.
    #[error("invalid task name `{0}`")]
    InvalidName(String),

    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// `true` for errors the orchestrator treats as "skip this task and carry on".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. }
                | StoreError::CorruptRecord { .. }
                | StoreError::MoveConflict { .. }
                | StoreError::IllegalTransition { .. }
        )
    }
}

/// Errors from the append-only audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the persistent key ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ledger at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to save ledger: {0}")]
    Save(#[from] StoreError),
}

/// Errors from loading `.steward/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parse error on load. The source carries serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from plan manipulation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("task is a `{0}`, not a plan")]
    NotAPlan(String),

    #[error("plan steps are not contiguous: expected step {expected}, found {found}")]
    NonContiguous { expected: usize, found: usize },

    #[error("plan has no step {0}")]
    StepNotFound(usize),

    #[error("plan must have at least one step")]
    Empty,
}

/// Errors from approval request handling.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("task is a `{0}`, not an approval request")]
    NotAnApproval(String),

    /// The request passed its expiry while still pending; it can no longer be approved.
    #[error("approval request {name} expired at {expired_at}")]
    Expired {
        name: TaskName,
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
