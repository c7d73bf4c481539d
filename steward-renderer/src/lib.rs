//! # steward-renderer
//!
//! Tera templates for everything steward writes as prose: the vault dashboard,
//! the instructions handed to the reasoning engine, and the bodies of tasks
//! steward creates itself.
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use steward_core::{MemoryTaskStore, StoreSnapshot};
//! use steward_renderer::{Projection, Renderer};
//!
//! fn dashboard(store: &MemoryTaskStore) -> Option<String> {
//!     let snapshot = StoreSnapshot::capture(store, Utc::now()).ok()?;
//!     let projection = Projection::recompute(&snapshot, &[]);
//!     Renderer::new().ok()?.render_dashboard(&projection).ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod projection;

pub use context::{
    ApprovalBodyCtx, ApprovedPromptCtx, BatchPromptCtx, FileDropCtx, PlanBodyCtx, PromptTask,
};
pub use engine::{Renderer, TemplateKind};
pub use error::RenderError;
pub use projection::Projection;
