//! Vault configuration, `.steward/config.yaml`.
//!
//! ```yaml
//! check_interval_secs: 30
//! claim_retention_days: 30
//! engine:
//!   command: qwen
//!   args: ["--yolo"]
//!   timeout_secs: 300
//! dashboard:
//!   recent_events: 10
//! watch:
//!   inbox: Inbox
//!   interval_secs: 30
//! ```
//!
//! Every key is optional. A missing file yields the defaults; a malformed one
//! is [`ConfigError::Parse`] naming the file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewardConfig {
    pub check_interval_secs: u64,
    /// How long a claimed source identity is remembered for duplicate detection.
    pub claim_retention_days: u32,
    pub engine: EngineConfig,
    pub dashboard: DashboardConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub recent_events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Inbox directory, relative to the vault root.
    pub inbox: String,
    pub interval_secs: u64,
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            claim_retention_days: 30,
            engine: EngineConfig::default(),
            dashboard: DashboardConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "qwen".to_string(),
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { recent_events: 10 }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            inbox: paths::DEFAULT_INBOX.to_string(),
            interval_secs: 30,
        }
    }
}

impl StewardConfig {
    /// Load the config of the vault at `vault_root`, falling back to defaults.
    pub fn load(vault_root: &Path) -> Result<Self, ConfigError> {
        let path = paths::config_path(vault_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.timeout_secs.max(1))
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = StewardConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg, StewardConfig::default());
        assert_eq!(cfg.engine.command, "qwen");
        assert_eq!(cfg.engine_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".steward")).unwrap();
        std::fs::write(
            tmp.path().join(".steward/config.yaml"),
            "engine:\n  command: claude\n  args: [\"-p\"]\ndashboard:\n  recent_events: 3\n",
        )
        .unwrap();
        let cfg = StewardConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg.engine.command, "claude");
        assert_eq!(cfg.engine.args, vec!["-p".to_string()]);
        assert_eq!(cfg.engine.timeout_secs, 300);
        assert_eq!(cfg.dashboard.recent_events, 3);
        assert_eq!(cfg.check_interval_secs, 30);
        assert_eq!(cfg.claim_retention_days, 30);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".steward")).unwrap();
        std::fs::write(tmp.path().join(".steward/config.yaml"), "engine: [oops\n").unwrap();
        let err = StewardConfig::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("config.yaml"));
    }
}
