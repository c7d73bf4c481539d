//! Key ledger: a persistent set of keys that have already been acted upon.
//!
//! Watchers keep one ledger of dedup keys each (`.steward/seen/<watcher>.json`);
//! the orchestrator keeps one of claimed source identities
//! (`.steward/claimed.json`). Saves go through [`atomic_write`], the same
//! durable temp-then-rename path task files use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::store::atomic_write;

/// On-disk ledger payload: each key with the instant it was first recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerFile {
    pub updated_at: DateTime<Utc>,
    pub keys: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct KeyLedger {
    path: PathBuf,
    file: LedgerFile,
}

impl KeyLedger {
    /// Load the ledger at `path`. Returns an empty ledger if the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                file: LedgerFile {
                    updated_at: Utc::now(),
                    keys: BTreeMap::new(),
                },
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| ledger_io(&path, e))?;
        let file = serde_json::from_str::<LedgerFile>(&contents)
            .map_err(|source| LedgerError::Parse {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.file.keys.contains_key(key)
    }

    /// Record a key in memory at `at`; returns `false` if it was already
    /// present, in which case its original timestamp is kept.
    pub fn insert(&mut self, key: impl Into<String>, at: DateTime<Utc>) -> bool {
        match self.file.keys.entry(key.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        }
    }

    /// Forget keys first recorded before `cutoff`. Returns how many were dropped.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.file.keys.len();
        self.file.keys.retain(|_, recorded| *recorded >= cutoff);
        before - self.file.keys.len()
    }

    pub fn len(&self) -> usize {
        self.file.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.file.keys.keys().map(String::as_str)
    }

    /// Persist atomically, creating the parent directory if needed.
    pub fn save(&mut self) -> Result<(), LedgerError> {
        let Some(dir) = self.path.parent() else {
            return Err(ledger_io(
                &self.path,
                std::io::Error::other("invalid ledger path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| ledger_io(dir, e))?;

        self.file.updated_at = Utc::now();
        let json = serde_json::to_vec_pretty(&self.file)?;
        atomic_write(&self.path, &json)?;
        Ok(())
    }
}

fn ledger_io(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_ledger_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let ledger = KeyLedger::load(tmp.path().join("seen/file_drop.json")).unwrap();
        assert!(ledger.is_empty());
    }

    fn at(day: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seen/file_drop.json");
        let mut ledger = KeyLedger::load(&path).unwrap();
        assert!(ledger.insert("file_drop:abc", at(1)));
        assert!(!ledger.insert("file_drop:abc", at(2)));
        ledger.save().unwrap();

        let loaded = KeyLedger::load(&path).unwrap();
        assert!(loaded.contains("file_drop:abc"));
        assert_eq!(loaded.len(), 1);
        assert!(!crate::paths::temp_sibling(&path).exists());
    }

    #[test]
    fn prune_drops_only_keys_older_than_cutoff() {
        let tmp = TempDir::new().unwrap();
        let mut ledger = KeyLedger::load(tmp.path().join("claimed.json")).unwrap();
        ledger.insert("old", at(1));
        ledger.insert("edge", at(10));
        ledger.insert("new", at(20));
        assert!(!ledger.insert("old", at(25)), "re-insert keeps the first timestamp");

        assert_eq!(ledger.prune_before(at(10)), 1);
        assert_eq!(ledger.keys().collect::<Vec<_>>(), vec!["edge", "new"]);
    }

    #[test]
    fn bare_array_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("claimed.json");
        std::fs::write(&path, r#"["gmail:1"]"#).unwrap();
        assert!(matches!(
            KeyLedger::load(&path),
            Err(LedgerError::Parse { .. })
        ));
    }

    #[test]
    fn garbage_is_a_parse_error_naming_the_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("claimed.json");
        std::fs::write(&path, "{{{").unwrap();
        match KeyLedger::load(&path).unwrap_err() {
            LedgerError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
