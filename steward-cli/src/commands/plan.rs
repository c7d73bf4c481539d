//! `steward plan`: multi-step plans kept in `Plans/`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

use steward_core::paths::templates_dir;
use steward_core::plan::checklist;
use steward_core::{
    AuditEvent, AuditKind, AuditLog, Folder, Plan, Priority, StepStatus, Task, TaskDetail,
    TaskKind, TaskName, TaskStatus, TaskStore,
};
use steward_renderer::{PlanBodyCtx, Renderer};

use super::open_vault;

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Write a new plan with a numbered checklist.
    Create(CreateArgs),
    /// Set the status (and optionally a note) of one step.
    Update(UpdateArgs),
    /// Show every step of a plan.
    Status(TargetArgs),
    /// List plans with their progress.
    List(ListArgs),
    /// Mark a plan completed and archive it to Done.
    Complete(TargetArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// What the plan achieves.
    #[arg(long)]
    pub objective: String,

    /// One step description (repeatable, in order).
    #[arg(long = "step", required = true)]
    pub steps: Vec<String>,

    /// Task file the plan was derived from.
    #[arg(long)]
    pub source: Option<String>,

    /// low, normal, high or critical.
    #[arg(long, default_value = "normal")]
    pub priority: Priority,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Plan file name.
    pub name: String,

    /// 1-based step index.
    pub step: usize,

    /// not_started, completed, failed or skipped.
    #[arg(long, default_value = "completed")]
    pub status: StepStatus,

    /// Note recorded under the step.
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Plan file name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Only list plans whose header status matches.
    #[arg(long)]
    pub status: Option<TaskStatus>,
}

#[derive(Tabled)]
struct PlanListRow {
    #[tabled(rename = "plan")]
    name: String,
    #[tabled(rename = "objective")]
    objective: String,
    #[tabled(rename = "progress")]
    progress: String,
    #[tabled(rename = "status")]
    status: String,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "step")]
    description: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "note")]
    note: String,
}

pub fn run(command: PlanCommand) -> Result<()> {
    match command {
        PlanCommand::Create(args) => create(args),
        PlanCommand::Update(args) => update(args),
        PlanCommand::Status(args) => status(args),
        PlanCommand::List(args) => list(args),
        PlanCommand::Complete(args) => complete(args),
    }
}

fn load_plan(store: &impl TaskStore, name: &TaskName) -> Result<Plan> {
    let task = store
        .read(Folder::Plans, name)
        .with_context(|| format!("cannot read plan {name}"))?;
    Plan::from_task(task).with_context(|| format!("{name} is not a valid plan"))
}

fn progress(plan: &Plan) -> String {
    format!(
        "{}/{} ({:.0}%)",
        plan.completed_steps(),
        plan.steps().len(),
        plan.progress_fraction() * 100.0
    )
}

fn create(args: CreateArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let steps: Vec<String> = args
        .steps
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if steps.is_empty() {
        bail!("a plan needs at least one non-empty --step");
    }

    let now = Utc::now();
    let ctx = PlanBodyCtx {
        objective: args.objective.clone(),
        checklist: checklist(&steps),
        source_task: args.source.clone(),
    };
    let body = Renderer::with_overrides(&templates_dir(vault.root()))?.render_plan_body(&ctx)?;
    let name = TaskName::generate(now, TaskKind::Plan, &args.objective, None);
    let task = Task::new(
        TaskDetail::Plan {
            objective: args.objective,
        },
        now,
        body,
    )
    .with_priority(args.priority)
    .with_status(TaskStatus::InProgress);
    vault
        .store()
        .write(Folder::Plans, &name, &task)
        .context("failed to write plan")?;

    AuditLog::for_vault(vault.root())
        .append(&AuditEvent::new(
            AuditKind::TaskEnqueued,
            now,
            json!({
                "task": name.as_str(),
                "folder": Folder::Plans.dir_name(),
                "source": "cli",
                "source_task": args.source,
            }),
        ))
        .context("failed to append audit event")?;
    println!("{} {} ({} steps)", "created".green(), name, steps.len());
    Ok(())
}

fn update(args: UpdateArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();
    let name = TaskName::from(args.name.as_str());
    let mut plan = load_plan(&store, &name)?;

    plan.update_step(args.step, args.status, args.note.as_deref())
        .with_context(|| format!("cannot update step {} of {name}", args.step))?;
    store
        .write(Folder::Plans, &name, plan.task())
        .context("failed to write plan")?;
    println!("{} step {} → {}  [{}]", name, args.step, args.status, progress(&plan));
    Ok(())
}

fn status(args: TargetArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let name = TaskName::from(args.name.as_str());
    let plan = load_plan(&vault.store(), &name)?;

    println!("{} {}", "plan".bold(), plan.objective());
    println!("progress: {}", progress(&plan));
    let rows: Vec<StepRow> = plan
        .steps()
        .iter()
        .map(|s| StepRow {
            index: s.index,
            description: s.description.clone(),
            status: s.status.to_string(),
            note: s.note.clone().unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();

    let mut rows = Vec::new();
    for name in store.list(Folder::Plans)? {
        let Ok(plan) = load_plan(&store, &name) else {
            continue;
        };
        if args
            .status
            .is_some_and(|wanted| plan.task().header.status != wanted)
        {
            continue;
        }
        rows.push(PlanListRow {
            name: name.to_string(),
            objective: plan.objective().to_string(),
            progress: progress(&plan),
            status: plan.task().header.status.to_string(),
        });
    }
    if rows.is_empty() {
        println!("no plans");
        return Ok(());
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn complete(args: TargetArgs) -> Result<()> {
    let vault = open_vault(&args.vault)?;
    let store = vault.store();
    let name = TaskName::from(args.name.as_str());
    let plan = load_plan(&store, &name)?;
    let remaining = plan.steps().len() - plan.completed_steps();

    store
        .move_task(&name, Folder::Plans, Folder::Done)
        .with_context(|| format!("cannot archive {name}"))?;
    let task = plan.task().clone().with_status(TaskStatus::Completed);
    store
        .write(Folder::Done, &name, &task)
        .context("failed to write archived plan")?;

    AuditLog::for_vault(vault.root())
        .append(&AuditEvent::task_transitioned(
            Utc::now(),
            &name,
            Folder::Plans,
            Folder::Done,
            Some("plan completed"),
        ))
        .context("failed to append audit event")?;

    if remaining > 0 {
        println!(
            "{} {} archived with {remaining} unfinished step(s)",
            "warn".yellow().bold(),
            name
        );
    } else {
        println!("{} {}", "completed".green(), name);
    }
    Ok(())
}
