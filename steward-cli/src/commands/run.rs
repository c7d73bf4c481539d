//! `steward run`: the orchestrator entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use steward_daemon::start_blocking;

use super::{load_config, open_vault};

/// Arguments for `steward run`. Flags override `.steward/config.yaml`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Seconds between cycles.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Reasoning engine command.
    #[arg(long)]
    pub engine: Option<String>,

    /// Extra argument for the engine command (repeatable).
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Engine timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let vault = open_vault(&self.vault)?;
        let mut config = load_config(&vault)?;

        if let Some(secs) = self.interval {
            config.check_interval_secs = secs;
        }
        if let Some(engine) = self.engine {
            config.engine.command = engine;
        }
        if !self.engine_args.is_empty() {
            config.engine.args = self.engine_args;
        }
        if let Some(secs) = self.timeout {
            config.engine.timeout_secs = secs;
        }

        start_blocking(vault.root(), config, self.once).context("orchestrator exited with error")
    }
}
