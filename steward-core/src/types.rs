//! Domain types shared by every steward crate.
//!
//! Enum string forms match the keys written into task headers, so
//! `Display`/`FromStr` and serde agree on a single spelling.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// File name of a task inside a vault folder (e.g. `20260118T103000Z_file_drop_report.md`).
///
/// Stable across the task's whole lifecycle; moving between folders never renames it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskName(pub String);

impl TaskName {
    /// Build a name whose lexicographic order follows creation time.
    ///
    /// `<YYYYMMDDTHHMMSSZ>_<kind>_<slug>[_<suffix>].md`
    pub fn generate(
        created_at: DateTime<Utc>,
        kind: TaskKind,
        slug: &str,
        suffix: Option<&str>,
    ) -> Self {
        let stamp = created_at.format("%Y%m%dT%H%M%SZ");
        let slug = slugify(slug);
        match suffix {
            Some(suffix) => Self(format!("{stamp}_{kind}_{slug}_{}.md", slugify(suffix))),
            None => Self(format!("{stamp}_{kind}_{slug}.md")),
        }
    }

    /// A usable task name is a plain, visible `.md` file name.
    pub fn is_valid(&self) -> bool {
        let name = self.0.as_str();
        name.ends_with(".md")
            && name.len() > 3
            && !name.starts_with('.')
            && !name.contains('/')
            && !name.contains('\\')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TaskName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Lower-case, filesystem-safe slug (alphanumerics kept, everything else `_`), max 40 chars.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_underscore = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    out.truncate(40);
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("task");
    }
    out
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Discriminant of the `type` header key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FileDrop,
    GmailEmail,
    LinkedinPost,
    ApprovalRequest,
    Plan,
}

impl TaskKind {
    pub fn all() -> &'static [TaskKind] {
        &[
            TaskKind::FileDrop,
            TaskKind::GmailEmail,
            TaskKind::LinkedinPost,
            TaskKind::ApprovalRequest,
            TaskKind::Plan,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::FileDrop => "file_drop",
            TaskKind::GmailEmail => "gmail_email",
            TaskKind::LinkedinPost => "linkedin_post",
            TaskKind::ApprovalRequest => "approval_request",
            TaskKind::Plan => "plan",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Status recorded in a task header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Rejected,
    Completed,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Completed => "completed",
            TaskStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            "completed" => Ok(TaskStatus::Completed),
            "expired" => Ok(TaskStatus::Expired),
            other => Err(other.to_string()),
        }
    }
}

/// Task priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_names_sort_by_creation_time() {
        let early = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 1).unwrap();
        let a = TaskName::generate(early, TaskKind::FileDrop, "zeta report.pdf", None);
        let b = TaskName::generate(late, TaskKind::FileDrop, "alpha", None);
        assert!(a < b);
        assert_eq!(a.as_str(), "20260105T090000Z_file_drop_zeta_report_pdf.md");
        assert!(a.is_valid());
    }

    #[test]
    fn name_validation_rejects_paths_and_hidden_files() {
        assert!(!TaskName::from("../escape.md").is_valid());
        assert!(!TaskName::from(".hidden.md").is_valid());
        assert!(!TaskName::from("notes.txt").is_valid());
        assert!(TaskName::from("TASK.md").is_valid());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Send Invoice -- ACME  "), "send_invoice_acme");
        assert_eq!(slugify("???"), "task");
    }

    #[test]
    fn slugify_never_ends_on_a_separator_after_truncation() {
        // 39 letters, then a space that lands on the 40th position.
        let input = format!("{} tail", "a".repeat(39));
        let slug = slugify(&input);
        assert_eq!(slug, "a".repeat(39));
        assert!(slug.len() <= 40);
    }

    #[test]
    fn enum_string_forms_roundtrip() {
        for kind in TaskKind::all() {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), *kind);
        }
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!(Priority::Critical > Priority::Normal);
    }
}
