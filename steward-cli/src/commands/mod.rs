pub mod approval;
pub mod dashboard;
pub mod plan;
pub mod run;
pub mod status;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};

use steward_core::{StewardConfig, Vault};

/// Open an existing vault, creating any missing workflow folders.
pub(crate) fn open_vault(path: &Path) -> Result<Vault> {
    Vault::open(path).with_context(|| format!("cannot open vault at {}", path.display()))
}

pub(crate) fn load_config(vault: &Vault) -> Result<StewardConfig> {
    StewardConfig::load(vault.root()).context("failed to load .steward/config.yaml")
}
