//! `steward watch`: the file-drop watcher loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use steward_daemon::watch_blocking;

use super::{load_config, open_vault};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Vault root directory.
    pub vault: PathBuf,

    /// Inbox directory, relative to the vault root.
    #[arg(long)]
    pub inbox: Option<String>,

    /// Seconds between polls.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Poll once and exit.
    #[arg(long)]
    pub once: bool,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let vault = open_vault(&self.vault)?;
        let mut config = load_config(&vault)?;
        if let Some(inbox) = self.inbox {
            config.watch.inbox = inbox;
        }
        if let Some(secs) = self.interval {
            config.watch.interval_secs = secs;
        }
        watch_blocking(vault.root(), config, self.once).context("watcher exited with error")
    }
}
