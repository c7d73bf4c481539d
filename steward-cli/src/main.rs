//! Steward: file-based task orchestration over a vault of markdown files.
//!
//! # Usage
//!
//! ```text
//! steward run <vault> [--interval <secs>] [--engine <cmd>] [--engine-arg <arg>]... [--timeout <secs>] [--once]
//! steward watch <vault> [--inbox <dir>] [--interval <secs>] [--once]
//! steward status <vault> [--json]
//! steward dashboard <vault>
//! steward approval create|check|list|approve|reject
//! steward plan create|update|status|list|complete
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    approval::ApprovalCommand, dashboard::DashboardArgs, plan::PlanCommand, run::RunArgs,
    status::StatusArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "steward",
    version,
    about = "Orchestrate markdown tasks through the folders of a vault",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the orchestrator loop: claim tasks, invoke the engine, execute approvals.
    Run(RunArgs),

    /// Run the file-drop watcher on the vault inbox.
    Watch(WatchArgs),

    /// Show folder counts, stuck tasks and waiting approvals.
    Status(StatusArgs),

    /// Recompute and write Dashboard.md once.
    Dashboard(DashboardArgs),

    /// Create, inspect and decide approval requests.
    Approval {
        #[command(subcommand)]
        command: ApprovalCommand,
    },

    /// Create and track multi-step plans.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Dashboard(args) => args.run(),
        Commands::Approval { command } => commands::approval::run(command),
        Commands::Plan { command } => commands::plan::run(command),
    }
}
