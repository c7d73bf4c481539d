//! Dashboard projection: a pure summary of a store snapshot plus the audit tail.
//!
//! Nothing here reads the clock. Expiry is judged against
//! [`StoreSnapshot::captured_at`], and the only timestamps shown come from
//! audit events, so identical inputs always project identically.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use steward_core::task::format_timestamp;
use steward_core::{
    ApprovalRequest, AuditEvent, AuditKind, Folder, Plan, StoreSnapshot, TaskKind, TaskStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderCount {
    pub folder: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRow {
    pub task: String,
    pub action_type: String,
    pub action: Option<String>,
    pub expires_at: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRow {
    pub task: String,
    pub objective: String,
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    pub timestamp: String,
    pub event: String,
    pub task: String,
    pub summary: String,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub counts: Vec<FolderCount>,
    pub total: usize,
    /// Tasks still in `In_Progress` when the projection was computed.
    pub stuck: usize,
    pub stuck_tasks: Vec<String>,
    pub corrupt: Vec<String>,
    pub approvals: Vec<ApprovalRow>,
    pub expired_approvals: usize,
    pub plans: Vec<PlanRow>,
    pub recent: Vec<EventRow>,
    pub recent_errors: usize,
    pub last_engine_invoked: Option<String>,
    pub last_activity: Option<String>,
}

impl Projection {
    /// Full recomputation; never patches a previous projection.
    pub fn recompute(snapshot: &StoreSnapshot, recent: &[AuditEvent]) -> Self {
        let counts = Folder::ALL
            .iter()
            .map(|f| FolderCount {
                folder: f.dir_name().to_string(),
                count: snapshot.count(*f),
            })
            .collect();

        let stuck_tasks: Vec<String> = snapshot
            .entries(Folder::InProgress)
            .iter()
            .map(|e| e.name.to_string())
            .collect();

        let corrupt = snapshot
            .corrupt()
            .map(|(folder, name)| format!("{folder}/{name}"))
            .collect();

        let now = snapshot.captured_at;
        let mut approvals = Vec::new();
        for folder in [Folder::PendingApproval, Folder::Approved] {
            for (name, task) in snapshot.tasks(folder) {
                let Ok(request) = ApprovalRequest::from_task(name, task) else {
                    continue;
                };
                approvals.push(ApprovalRow {
                    task: name.to_string(),
                    action_type: table_cell(&request.action_type),
                    action: request.action.as_deref().map(table_cell),
                    expires_at: format_timestamp(request.expires_at),
                    status: request.effective_status(folder, now).to_string(),
                });
            }
        }
        let expired_approvals = approvals
            .iter()
            .filter(|a| a.status == TaskStatus::Expired.as_str())
            .count();

        let plans = snapshot
            .tasks(Folder::Plans)
            .filter(|(_, task)| task.kind() == TaskKind::Plan)
            .filter_map(|(name, task)| {
                let plan = Plan::from_task(task.clone()).ok()?;
                Some(PlanRow {
                    task: name.to_string(),
                    objective: table_cell(plan.objective()),
                    completed: plan.completed_steps(),
                    total: plan.steps().len(),
                    percent: (plan.progress_fraction() * 100.0).round() as u32,
                    status: plan.task().header.status.to_string(),
                })
            })
            .collect();

        let recent: Vec<EventRow> = recent.iter().rev().map(event_row).collect();
        let recent_errors = recent.iter().filter(|r| r.event == "error").count();
        let last_engine_invoked = last_engine_invocation(&recent);

        Projection {
            counts,
            total: snapshot.total(),
            stuck: stuck_tasks.len(),
            stuck_tasks,
            corrupt,
            approvals,
            expired_approvals,
            plans,
            last_activity: recent.first().map(|r| r.timestamp.clone()),
            recent,
            recent_errors,
            last_engine_invoked,
        }
    }

    /// Use the last engine invocation found in the full audit log.
    ///
    /// The recent tail only covers the last few events; `None` keeps whatever
    /// the tail showed.
    pub fn with_last_engine_invoked(mut self, at: Option<DateTime<Utc>>) -> Self {
        if let Some(at) = at {
            self.last_engine_invoked = Some(format_timestamp(at));
        }
        self
    }

    pub fn count(&self, folder: Folder) -> usize {
        self.counts
            .iter()
            .find(|c| c.folder == folder.dir_name())
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

fn last_engine_invocation(rows: &[EventRow]) -> Option<String> {
    rows.iter()
        .find(|r| r.event == AuditKind::EngineInvoked.as_str())
        .map(|r| r.timestamp.clone())
}

fn event_row(event: &AuditEvent) -> EventRow {
    let details = &event.details;
    let text = |key: &str| details.get(key).and_then(Value::as_str);
    let summary = match event.event {
        AuditKind::TaskTransitioned => {
            let mut s = format!("{} → {}", text("from").unwrap_or("?"), text("to").unwrap_or("?"));
            if let Some(reason) = text("reason") {
                s.push_str(&format!(" ({reason})"));
            }
            s
        }
        AuditKind::TaskClaimed => "claimed".to_string(),
        AuditKind::TaskEnqueued => format!("from {}", text("watcher").unwrap_or("watcher")),
        AuditKind::EngineInvoked => match details.get("tasks").and_then(Value::as_array) {
            Some(tasks) => format!("batch of {}", tasks.len()),
            None => text("mode").unwrap_or("invoked").to_string(),
        },
        AuditKind::Error => text("message").unwrap_or("error").to_string(),
    };
    EventRow {
        timestamp: format_timestamp(event.timestamp),
        event: event.event.to_string(),
        task: event.task().unwrap_or("").to_string(),
        summary: table_cell(&summary),
    }
}

/// Text safe to place inside one markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
