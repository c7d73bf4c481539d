//! Inbox watcher: every visible file dropped into the inbox becomes a
//! `file_drop` task, keyed by the SHA-256 of its contents.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;

use steward_core::{Task, TaskDetail, TaskKind, TaskName};
use steward_renderer::{FileDropCtx, Renderer};

use crate::{WatchError, Watcher};

/// A file observed in the inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Hex SHA-256 of the contents.
    pub digest: String,
}

pub struct FileDropWatcher {
    inbox: PathBuf,
    renderer: Renderer,
}

impl FileDropWatcher {
    pub fn new(inbox: impl Into<PathBuf>, renderer: Renderer) -> Self {
        Self {
            inbox: inbox.into(),
            renderer,
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn hash_file(path: &Path) -> Result<(String, u64), WatchError> {
    let bytes = fs::read(path).map_err(|e| WatchError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut h = Sha256::new();
    h.update(&bytes);
    Ok((hex::encode(h.finalize()), bytes.len() as u64))
}

impl Watcher for FileDropWatcher {
    type Item = DroppedFile;

    fn name(&self) -> &str {
        "file_drop"
    }

    /// Visible regular files directly inside the inbox, sorted by name.
    /// A missing inbox yields nothing.
    fn detect(&self) -> Result<impl Iterator<Item = Self::Item> + '_, WatchError> {
        let mut found = Vec::new();
        if !self.inbox.is_dir() {
            return Ok(found.into_iter());
        }

        let entries = fs::read_dir(&self.inbox).map_err(|e| WatchError::Io {
            path: self.inbox.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| WatchError::Io {
                path: self.inbox.clone(),
                source: e,
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if is_hidden(&file_name) || !path.is_file() {
                continue;
            }
            // A file still being written or removed mid-scan is picked up next pass.
            match hash_file(&path) {
                Ok((digest, size)) => found.push(DroppedFile {
                    path,
                    file_name,
                    size,
                    digest,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable inbox file"),
            }
        }

        found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(found.into_iter())
    }

    fn dedupe_key(&self, item: &Self::Item) -> String {
        format!("file_drop:{}", item.digest)
    }

    fn to_task(
        &self,
        item: &Self::Item,
        now: DateTime<Utc>,
    ) -> Result<(TaskName, Task), WatchError> {
        let stem = Path::new(&item.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.file_name.clone());
        let name = TaskName::generate(now, TaskKind::FileDrop, &stem, Some(&item.digest[..8]));

        let ctx = FileDropCtx::new(&item.file_name, item.size, now);
        let body = self.renderer.render_file_drop(&ctx)?;
        let task = Task::new(
            TaskDetail::FileDrop {
                source_file: item.file_name.clone(),
            },
            now,
            body,
        )
        .with_source_identity(self.dedupe_key(item))
        .with_extra("file_type", ctx.file_type.clone())
        .with_extra("file_size", format!("{} bytes", item.size));

        Ok((name, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn watcher(inbox: &Path) -> FileDropWatcher {
        FileDropWatcher::new(inbox, Renderer::new().unwrap())
    }

    #[test]
    fn hidden_files_and_directories_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.pdf"), "a").unwrap();
        fs::write(tmp.path().join(".DS_Store"), "x").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let w = watcher(tmp.path());
        let names: Vec<String> = w.detect().unwrap().map(|f| f.file_name).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt"]);
    }

    #[test]
    fn missing_inbox_detects_nothing() {
        let tmp = TempDir::new().unwrap();
        let w = watcher(&tmp.path().join("Inbox"));
        assert_eq!(w.detect().unwrap().count(), 0);
    }

    #[test]
    fn task_carries_digest_key_and_file_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Report Q1.PDF"), "quarterly").unwrap();
        let w = watcher(tmp.path());
        let item = w.detect().unwrap().next().unwrap();

        let (name, task) = w.to_task(&item, Utc::now()).unwrap();
        assert!(name.is_valid());
        assert!(name.as_str().contains("_file_drop_report_q1_"));
        assert_eq!(
            task.header.source_identity.as_deref(),
            Some(format!("file_drop:{}", item.digest).as_str())
        );
        assert!(task.body.contains("Report Q1.PDF"));
        assert_eq!(
            task.header.extra.get("file_type").and_then(|v| v.as_str()),
            Some(".pdf")
        );
    }
}
