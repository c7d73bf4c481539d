//! `steward status`: folder counts, stuck tasks and approvals at a glance.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use steward_core::{AuditKind, AuditLog, StoreSnapshot, TaskStatus};
use steward_renderer::projection::{ApprovalRow, FolderCount, PlanRow};
use steward_renderer::Projection;

use super::{load_config, open_vault};

/// Arguments for `steward status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let vault = open_vault(&self.vault)?;
        let config = load_config(&vault)?;
        let snapshot =
            StoreSnapshot::capture(&vault.store(), Utc::now()).context("failed to read vault")?;
        let events = AuditLog::for_vault(vault.root())
            .tail(config.dashboard.recent_events)
            .context("failed to read audit log")?;
        let last_engine = AuditLog::for_vault(vault.root())
            .last_of(AuditKind::EngineInvoked)
            .context("failed to read audit log")?;
        let projection = Projection::recompute(&snapshot, &events)
            .with_last_engine_invoked(last_engine.map(|e| e.timestamp));

        if self.json {
            let report = StatusJson {
                vault: vault.root().display().to_string(),
                total: projection.total,
                counts: &projection.counts,
                stuck: &projection.stuck_tasks,
                corrupt: &projection.corrupt,
                approvals: &projection.approvals,
                plans: &projection.plans,
                last_engine_invoked: projection.last_engine_invoked.as_deref(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render status JSON")?
            );
            return Ok(());
        }

        print_report(&projection);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    vault: String,
    total: usize,
    counts: &'a [FolderCount],
    stuck: &'a [String],
    corrupt: &'a [String],
    approvals: &'a [ApprovalRow],
    plans: &'a [PlanRow],
    last_engine_invoked: Option<&'a str>,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "folder")]
    folder: String,
    #[tabled(rename = "tasks")]
    count: usize,
}

#[derive(Tabled)]
struct ApprovalTableRow {
    #[tabled(rename = "request")]
    task: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "expires")]
    expires_at: String,
    #[tabled(rename = "status")]
    status: String,
}

fn print_report(projection: &Projection) {
    let rows: Vec<CountRow> = projection
        .counts
        .iter()
        .map(|c| CountRow {
            folder: c.folder.clone(),
            count: c.count,
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if projection.stuck == 0 {
        println!("{} nothing stuck in In_Progress", "ok".green());
    } else {
        println!(
            "{} {} task(s) stuck in In_Progress",
            "warn".yellow().bold(),
            projection.stuck
        );
        for name in &projection.stuck_tasks {
            println!("  - {name}");
        }
    }
    for path in &projection.corrupt {
        println!("{} unreadable task file {path}", "error".red().bold());
    }

    if projection.approvals.is_empty() {
        println!("no approval requests waiting");
        return;
    }
    let rows: Vec<ApprovalTableRow> = projection
        .approvals
        .iter()
        .map(|a| ApprovalTableRow {
            task: a.task.clone(),
            action: match &a.action {
                Some(action) => format!("{} ({action})", a.action_type),
                None => a.action_type.clone(),
            },
            expires_at: a.expires_at.clone(),
            status: colorize_status(&a.status),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn colorize_status(status: &str) -> String {
    if status == TaskStatus::Expired.as_str() {
        status.red().to_string()
    } else if status == TaskStatus::Approved.as_str() {
        status.green().to_string()
    } else {
        status.yellow().to_string()
    }
}
