//! Vault layout helpers. Pure path arithmetic, no I/O.
//!
//! ```text
//! <vault>/
//!   Needs_Action/ In_Progress/ Pending_Approval/ Approved/ Rejected/ Done/ Plans/
//!   Inbox/                      (file-drop watcher input)
//!   Logs/<YYYY-MM-DD>.jsonl     (audit log partitions)
//!   Dashboard.md
//!   .steward/
//!     config.yaml
//!     claimed.json
//!     seen/<watcher>.json
//!     templates/*.tera
//!     last_prompt.md
//!     manifest.json
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::state::Folder;
use crate::types::TaskName;

pub const STEWARD_DIR: &str = ".steward";
pub const LOGS_DIR: &str = "Logs";
pub const DASHBOARD_FILE: &str = "Dashboard.md";
pub const DEFAULT_INBOX: &str = "Inbox";
pub const CONFIG_FILE: &str = "config.yaml";
pub const CLAIMED_LEDGER: &str = "claimed.json";
pub const LAST_PROMPT_FILE: &str = "last_prompt.md";
pub const MANIFEST_FILE: &str = "manifest.json";

pub fn folder_dir(vault: &Path, folder: Folder) -> PathBuf {
    vault.join(folder.dir_name())
}

pub fn task_path(vault: &Path, folder: Folder, name: &TaskName) -> PathBuf {
    folder_dir(vault, folder).join(name.as_str())
}

/// Same-directory temp sibling used by atomic writes (`.<name>.steward.tmp`).
pub fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.steward.tmp"))
}

pub fn steward_dir(vault: &Path) -> PathBuf {
    vault.join(STEWARD_DIR)
}

pub fn config_path(vault: &Path) -> PathBuf {
    steward_dir(vault).join(CONFIG_FILE)
}

pub fn claimed_ledger_path(vault: &Path) -> PathBuf {
    steward_dir(vault).join(CLAIMED_LEDGER)
}

pub fn seen_ledger_path(vault: &Path, watcher: &str) -> PathBuf {
    steward_dir(vault).join("seen").join(format!("{watcher}.json"))
}

pub fn templates_dir(vault: &Path) -> PathBuf {
    steward_dir(vault).join("templates")
}

pub fn last_prompt_path(vault: &Path) -> PathBuf {
    steward_dir(vault).join(LAST_PROMPT_FILE)
}

pub fn manifest_path(vault: &Path) -> PathBuf {
    steward_dir(vault).join(MANIFEST_FILE)
}

pub fn logs_dir(vault: &Path) -> PathBuf {
    vault.join(LOGS_DIR)
}

/// File name of the audit partition for one UTC day.
pub fn log_partition_file(day: NaiveDate) -> String {
    format!("{}.jsonl", day.format("%Y-%m-%d"))
}

pub fn dashboard_path(vault: &Path) -> PathBuf {
    vault.join(DASHBOARD_FILE)
}

pub fn inbox_dir(vault: &Path, inbox: &str) -> PathBuf {
    vault.join(inbox)
}
