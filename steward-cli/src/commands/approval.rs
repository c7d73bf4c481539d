//! `steward approval`: the human side of the approval workflow.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};
use tabled::{settings::Style, Table, Tabled};

use steward_core::approval::{self, NewApproval};
use steward_core::paths::templates_dir;
use steward_core::task::format_timestamp;
use steward_core::{
    ApprovalRequest, AuditEvent, AuditKind, AuditLog, Folder, Priority, TaskName, TaskStore,
};
use steward_renderer::{ApprovalBodyCtx, Renderer};

use super::open_vault;

#[derive(Subcommand, Debug)]
pub enum ApprovalCommand {
    /// Write a new request into Pending_Approval.
    Create(CreateArgs),
    /// Show where a request is and whether it has expired.
    Check(TargetArgs),
    /// List waiting requests.
    List(ListArgs),
    /// Move a pending request to Approved.
    Approve(TargetArgs),
    /// Move a pending (or expired) request to Rejected.
    Reject(TargetArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Action type, e.g. `email_send`.
    #[arg(long = "type")]
    pub action_type: String,

    /// Short action name, used in the file name.
    #[arg(long)]
    pub action: Option<String>,

    /// Action payload as a JSON object.
    #[arg(long, default_value = "{}")]
    pub payload: String,

    /// Human-readable description of what will happen.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Hours until the request expires.
    #[arg(long, default_value_t = 24)]
    pub ttl_hours: i64,

    /// One of low, normal, high, critical.
    #[arg(long, default_value = "normal")]
    pub priority: Priority,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Request file name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Include requests already in Approved.
    #[arg(long)]
    pub all: bool,
}

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "request")]
    name: String,
    #[tabled(rename = "type")]
    action_type: String,
    #[tabled(rename = "priority")]
    priority: String,
    #[tabled(rename = "expires")]
    expires_at: String,
    #[tabled(rename = "status")]
    status: String,
}

pub fn run(command: ApprovalCommand) -> Result<()> {
    match command {
        ApprovalCommand::Create(args) => create(args),
        ApprovalCommand::Check(args) => check(args),
        ApprovalCommand::List(args) => list(args),
        ApprovalCommand::Approve(args) => decide(args, Folder::Approved),
        ApprovalCommand::Reject(args) => decide(args, Folder::Rejected),
    }
}

fn create(args: CreateArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let payload: Value = serde_json::from_str(&args.payload).context("--payload must be JSON")?;
    if args.ttl_hours <= 0 {
        bail!("--ttl-hours must be positive");
    }

    let now = Utc::now();
    let ttl = Duration::hours(args.ttl_hours);
    let ctx = ApprovalBodyCtx {
        action_type: args.action_type.clone(),
        action: args.action.clone(),
        description: args.description.clone(),
        action_payload: serde_json::to_string_pretty(&payload)?,
        expires_at: format_timestamp(now + ttl),
    };
    let body = Renderer::with_overrides(&templates_dir(vault.root()))?.render_approval_body(&ctx)?;

    let params = NewApproval {
        action_type: args.action_type,
        action: args.action,
        action_payload: payload,
        description: args.description,
        ttl,
        priority: args.priority,
    };
    let (name, task) = approval::new_request(&params, now, body);
    vault
        .store()
        .write(Folder::PendingApproval, &name, &task)
        .context("failed to write approval request")?;

    AuditLog::for_vault(vault.root())
        .append(&AuditEvent::new(
            AuditKind::TaskEnqueued,
            now,
            json!({
                "task": name.as_str(),
                "folder": Folder::PendingApproval.dir_name(),
                "source": "cli",
                "execution_key": approval::execution_key(&name, &params.action_payload),
            }),
        ))
        .context("failed to append audit event")?;
    println!("{} {}", "created".green(), name);
    Ok(())
}

fn check(args: TargetArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();
    let name = TaskName::from(args.name.as_str());
    let Some(folder) = store.locate(&name)? else {
        bail!("no request named {name}");
    };
    let task = store.read(folder, &name)?;
    let request = ApprovalRequest::from_task(&name, &task)?;
    let status = request.effective_status(folder, Utc::now());

    println!("request:  {name}");
    println!("folder:   {folder}");
    println!("status:   {status}");
    println!("expires:  {}", format_timestamp(request.expires_at));
    println!("key:      {}", request.execution_key());
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();
    let now = Utc::now();

    let mut requests = approval::list_requests(&store, Folder::PendingApproval, now)?;
    if args.all {
        requests.extend(approval::list_requests(&store, Folder::Approved, now)?);
    }
    if requests.is_empty() {
        println!("no approval requests waiting");
        return Ok(());
    }

    let rows: Vec<RequestRow> = requests
        .into_iter()
        .map(|(request, status)| RequestRow {
            name: request.name.to_string(),
            action_type: request.action_type,
            priority: request.priority.to_string(),
            expires_at: format_timestamp(request.expires_at),
            status: status.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn decide(args: TargetArgs, to: Folder) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();
    let name = TaskName::from(args.name.as_str());
    let now = Utc::now();

    let (verb, reason) = match to {
        Folder::Approved => {
            approval::approve(&store, &name, now)
                .with_context(|| format!("cannot approve {name}"))?;
            ("approved", "approved by human")
        }
        _ => {
            approval::reject(&store, &name).with_context(|| format!("cannot reject {name}"))?;
            ("rejected", "rejected by human")
        }
    };
    AuditLog::for_vault(vault.root())
        .append(&AuditEvent::task_transitioned(
            now,
            &name,
            Folder::PendingApproval,
            to,
            Some(reason),
        ))
        .context("failed to append audit event")?;
    println!("{} {}", verb.green(), name);
    Ok(())
}
