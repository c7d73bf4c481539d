//! Orchestrator runtime: the claim/dispatch cycle, the reasoning-engine
//! bridge and the polling loops for the orchestrator and the file-drop watcher.

pub mod engine;
mod error;
pub mod orchestrator;
mod runtime;

pub use engine::{
    CommandEngine, EngineError, EngineOutput, EngineRequest, InvocationMode, Manifest,
    ReasoningEngine,
};
pub use error::DaemonError;
pub use orchestrator::{refresh_dashboard, CycleReport, Orchestrator};
pub use runtime::{
    run, run_until_shutdown, run_watcher, start_blocking, watch_blocking, watch_until_shutdown,
};
