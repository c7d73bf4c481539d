//! `steward dashboard`: one-shot dashboard refresh.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use steward_core::paths::{dashboard_path, templates_dir};
use steward_core::AuditLog;
use steward_daemon::refresh_dashboard;
use steward_renderer::Renderer;

use super::{load_config, open_vault};

#[derive(Args, Debug)]
pub struct DashboardArgs {
    /// Vault root directory.
    pub vault: PathBuf,
}

impl DashboardArgs {
    pub fn run(self) -> Result<()> {
        let vault = open_vault(&self.vault)?;
        let config = load_config(&vault)?;
        let renderer = Renderer::with_overrides(&templates_dir(vault.root()))
            .context("failed to load templates")?;

        let written = refresh_dashboard(
            vault.root(),
            &vault.store(),
            &AuditLog::for_vault(vault.root()),
            &renderer,
            config.dashboard.recent_events,
            Utc::now(),
        )
        .context("failed to refresh dashboard")?;

        let path = dashboard_path(vault.root());
        if written {
            println!("{} {}", "wrote".green(), path.display());
        } else {
            println!("{} {}", "unchanged".dimmed(), path.display());
        }
        Ok(())
    }
}
