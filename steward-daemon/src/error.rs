use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Error surface for the orchestrator, the engine bridge and the run loops.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] steward_core::StoreError),

    #[error("audit log error: {0}")]
    Audit(#[from] steward_core::AuditError),

    #[error("ledger error: {0}")]
    Ledger(#[from] steward_core::LedgerError),

    #[error("config error: {0}")]
    Config(#[from] steward_core::ConfigError),

    #[error("render error: {0}")]
    Render(#[from] steward_renderer::RenderError),

    #[error("watcher error: {0}")]
    Watch(#[from] steward_watch::WatchError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
