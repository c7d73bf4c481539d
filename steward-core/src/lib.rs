//! Steward core library: the vault model, task store and audit log.
//!
//! - [`types`]: task names and header enums
//! - [`task`]: task file codec
//! - [`state`]: folders and the transition table
//! - [`store`] / [`memory`]: filesystem and in-memory task stores
//! - [`plan`] / [`approval`]: typed views over plan and approval tasks
//! - [`audit`]: append-only JSONL audit log
//! - [`ledger`]: persistent key sets (dedup keys, claimed identities)
//! - [`config`]: `.steward/config.yaml`
//! - [`snapshot`]: point-in-time view of the whole store

pub mod approval;
pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod paths;
pub mod plan;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod task;
pub mod types;

pub use approval::{execution_key, ApprovalRequest};
pub use audit::{AuditEvent, AuditKind, AuditLog};
pub use config::StewardConfig;
pub use error::{
    ApprovalError, AuditError, ConfigError, LedgerError, PlanError, StoreError, TaskFormatError,
};
pub use ledger::KeyLedger;
pub use memory::MemoryTaskStore;
pub use plan::{Plan, Step, StepStatus};
pub use snapshot::{SnapshotEntry, StoreSnapshot};
pub use state::Folder;
pub use store::{FsTaskStore, TaskStore, Vault};
pub use task::{Task, TaskDetail, TaskHeader};
pub use types::{Priority, TaskKind, TaskName, TaskStatus};
