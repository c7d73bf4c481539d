//! Task store: the only way steward touches task files.
//!
//! # Write flow
//!
//! encode → `.<name>.steward.tmp` sibling → `sync_data` → `rename` over the
//! target. The temp file always lives in the destination folder, so the
//! rename never crosses filesystems and readers never see a partial file.
//!
//! # Move flow
//!
//! transition check → hard link into the destination → unlink the source.
//! The link fails if the destination exists, so a file created there at any
//! point is never overwritten. A missing source means another actor won the
//! race; both cases surface as [`StoreError::MoveConflict`].

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::state::{check_transition, Folder};
use crate::task::Task;
use crate::types::TaskName;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Storage seam shared by the orchestrator, watchers and CLI.
pub trait TaskStore: Send + Sync {
    /// Task names in `folder`, lexicographically ordered. Missing folders list as empty.
    fn list(&self, folder: Folder) -> Result<Vec<TaskName>, StoreError>;

    fn read(&self, folder: Folder, name: &TaskName) -> Result<Task, StoreError>;

    /// Create or replace a task atomically.
    fn write(&self, folder: Folder, name: &TaskName, task: &Task) -> Result<(), StoreError>;

    /// Move a task along one edge of the state machine.
    fn move_task(&self, name: &TaskName, from: Folder, to: Folder) -> Result<(), StoreError>;

    /// Where a task would live on disk (informational; used in engine manifests).
    fn task_path(&self, folder: Folder, name: &TaskName) -> PathBuf;

    /// First folder holding `name`, if any.
    fn locate(&self, name: &TaskName) -> Result<Option<Folder>, StoreError> {
        for folder in Folder::ALL {
            if self.list(folder)?.contains(name) {
                return Ok(Some(folder));
            }
        }
        Ok(None)
    }
}

/// Shared stores, e.g. one store handed to both the orchestrator and a test engine.
impl<T: TaskStore + ?Sized> TaskStore for std::sync::Arc<T> {
    fn list(&self, folder: Folder) -> Result<Vec<TaskName>, StoreError> {
        (**self).list(folder)
    }

    fn read(&self, folder: Folder, name: &TaskName) -> Result<Task, StoreError> {
        (**self).read(folder, name)
    }

    fn write(&self, folder: Folder, name: &TaskName, task: &Task) -> Result<(), StoreError> {
        (**self).write(folder, name, task)
    }

    fn move_task(&self, name: &TaskName, from: Folder, to: Folder) -> Result<(), StoreError> {
        (**self).move_task(name, from, to)
    }

    fn task_path(&self, folder: Folder, name: &TaskName) -> PathBuf {
        (**self).task_path(folder, name)
    }

    fn locate(&self, name: &TaskName) -> Result<Option<Folder>, StoreError> {
        (**self).locate(name)
    }
}

pub(crate) fn validate_name(name: &TaskName) -> Result<(), StoreError> {
    if name.is_valid() {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.0.clone()))
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A vault root whose folder layout is known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Open an existing vault, creating any missing folders, `Logs/` and `.steward/`.
    ///
    /// The root itself is never created: a missing root is [`StoreError::VaultMissing`].
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::VaultMissing { path: root });
        }
        let mut dirs: Vec<PathBuf> = Folder::ALL
            .iter()
            .map(|f| paths::folder_dir(&root, *f))
            .collect();
        dirs.push(paths::logs_dir(&root));
        dirs.push(paths::steward_dir(&root));
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> FsTaskStore {
        FsTaskStore {
            root: self.root.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// [`TaskStore`] over the folders of a vault.
#[derive(Debug, Clone)]
pub struct FsTaskStore {
    root: PathBuf,
}

impl FsTaskStore {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TaskStore for FsTaskStore {
    fn list(&self, folder: Folder) -> Result<Vec<TaskName>, StoreError> {
        let dir = paths::folder_dir(&self.root, folder);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(&dir, e)),
        };

        let mut names: Vec<TaskName> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| TaskName::from(e.file_name().to_string_lossy().into_owned()))
            .filter(TaskName::is_valid)
            .collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, folder: Folder, name: &TaskName) -> Result<Task, StoreError> {
        validate_name(name)?;
        let path = paths::task_path(&self.root, folder, name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    folder,
                    name: name.clone(),
                })
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        Task::parse(&text).map_err(|source| StoreError::CorruptRecord { path, source })
    }

    fn write(&self, folder: Folder, name: &TaskName, task: &Task) -> Result<(), StoreError> {
        validate_name(name)?;
        let path = paths::task_path(&self.root, folder, name);
        let text = task
            .to_markdown()
            .map_err(|source| StoreError::CorruptRecord {
                path: path.clone(),
                source,
            })?;
        let dir = paths::folder_dir(&self.root, folder);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        atomic_write(&path, text.as_bytes())?;
        debug!(task = %name, %folder, "task written");
        Ok(())
    }

    fn move_task(&self, name: &TaskName, from: Folder, to: Folder) -> Result<(), StoreError> {
        check_transition(name, from, to)?;
        validate_name(name)?;

        let src = paths::task_path(&self.root, from, name);
        let dst = paths::task_path(&self.root, to, name);
        let conflict = || StoreError::MoveConflict {
            name: name.clone(),
            from,
            to,
        };

        let dst_dir = paths::folder_dir(&self.root, to);
        fs::create_dir_all(&dst_dir).map_err(|e| io_err(&dst_dir, e))?;

        match move_no_replace(&src, &dst) {
            Ok(()) => {
                debug!(task = %name, %from, %to, "task moved");
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::AlreadyExists) => {
                Err(conflict())
            }
            Err(e) => Err(io_err(&src, e)),
        }
    }

    fn task_path(&self, folder: Folder, name: &TaskName) -> PathBuf {
        paths::task_path(&self.root, folder, name)
    }

    fn locate(&self, name: &TaskName) -> Result<Option<Folder>, StoreError> {
        validate_name(name)?;
        Ok(Folder::ALL
            .into_iter()
            .find(|folder| paths::task_path(&self.root, *folder, name).is_file()))
    }
}

/// Rename `src` to `dst`, failing with `AlreadyExists` instead of replacing
/// an existing `dst`.
///
/// The hard link is the claim: it cannot succeed if `dst` exists, and
/// removing `src` afterwards completes the move. If `src` vanished in between
/// another actor moved it too, so the new link is dropped again.
/// Filesystems without hard links fall back to a checked rename.
fn move_no_replace(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::hard_link(src, dst) {
        Ok(()) => match fs::remove_file(src) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(dst);
                Err(e)
            }
        },
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::AlreadyExists) => Err(e),
        Err(e) => {
            debug!(error = %e, "hard link unavailable, using checked rename");
            if dst.exists() {
                return Err(ErrorKind::AlreadyExists.into());
            }
            fs::rename(src, dst)
        }
    }
}

/// Write `bytes` to `path` through a same-directory temp file and a rename.
///
/// The temp file is removed when any step fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = paths::temp_sibling(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_data()?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDetail;
    use chrono::Utc;
    use tempfile::TempDir;

    fn drop_task() -> Task {
        Task::new(
            TaskDetail::FileDrop {
                source_file: "a.pdf".into(),
            },
            Utc::now(),
            "\n# File Drop\n",
        )
    }

    fn vault() -> (TempDir, FsTaskStore) {
        let tmp = TempDir::new().unwrap();
        let store = Vault::open(tmp.path()).unwrap().store();
        (tmp, store)
    }

    #[test]
    fn open_rejects_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = Vault::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::VaultMissing { .. }));
    }

    #[test]
    fn open_creates_layout() {
        let tmp = TempDir::new().unwrap();
        Vault::open(tmp.path()).unwrap();
        for folder in Folder::ALL {
            assert!(tmp.path().join(folder.dir_name()).is_dir());
        }
        assert!(tmp.path().join("Logs").is_dir());
        assert!(tmp.path().join(".steward").is_dir());
    }

    #[test]
    fn list_skips_hidden_and_temp_files() {
        let (tmp, store) = vault();
        let dir = tmp.path().join("Needs_Action");
        fs::write(dir.join(".b.md.steward.tmp"), "partial").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();
        store
            .write(Folder::NeedsAction, &"b.md".into(), &drop_task())
            .unwrap();
        store
            .write(Folder::NeedsAction, &"a.md".into(), &drop_task())
            .unwrap();
        let names = store.list(Folder::NeedsAction).unwrap();
        assert_eq!(names, vec![TaskName::from("a.md"), TaskName::from("b.md")]);
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let (tmp, store) = vault();
        store
            .write(Folder::NeedsAction, &"a.md".into(), &drop_task())
            .unwrap();
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("Needs_Action"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn move_refuses_to_overwrite() {
        let (_tmp, store) = vault();
        let name = TaskName::from("a.md");
        store.write(Folder::NeedsAction, &name, &drop_task()).unwrap();
        store.write(Folder::InProgress, &name, &drop_task()).unwrap();
        let err = store
            .move_task(&name, Folder::NeedsAction, Folder::InProgress)
            .unwrap_err();
        assert!(matches!(err, StoreError::MoveConflict { .. }));
        assert_eq!(store.list(Folder::NeedsAction).unwrap(), vec![name]);
    }

    #[test]
    fn move_leaves_exactly_one_copy() {
        let (tmp, store) = vault();
        let name = TaskName::from("a.md");
        let task = drop_task();
        store.write(Folder::NeedsAction, &name, &task).unwrap();
        store
            .move_task(&name, Folder::NeedsAction, Folder::InProgress)
            .unwrap();
        assert!(!tmp.path().join("Needs_Action/a.md").exists());
        assert_eq!(
            store.read(Folder::InProgress, &name).unwrap().to_markdown().unwrap(),
            task.to_markdown().unwrap()
        );
    }

    #[test]
    fn move_no_replace_keeps_an_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.md");
        let dst = tmp.path().join("dst.md");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "already here").unwrap();
        let err = move_no_replace(&src, &dst).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "already here");
        assert_eq!(fs::read_to_string(&src).unwrap(), "new");
    }

    #[test]
    fn moving_a_vanished_task_is_a_conflict() {
        let (_tmp, store) = vault();
        let err = store
            .move_task(&"gone.md".into(), Folder::NeedsAction, Folder::InProgress)
            .unwrap_err();
        assert!(matches!(err, StoreError::MoveConflict { .. }));
    }

    #[test]
    fn illegal_move_touches_nothing() {
        let (_tmp, store) = vault();
        let name = TaskName::from("a.md");
        store.write(Folder::Done, &name, &drop_task()).unwrap();
        let err = store
            .move_task(&name, Folder::Done, Folder::NeedsAction)
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert_eq!(store.locate(&name).unwrap(), Some(Folder::Done));
    }

    #[test]
    fn read_reports_corrupt_and_missing() {
        let (tmp, store) = vault();
        fs::write(tmp.path().join("Needs_Action/bad.md"), "no header").unwrap();
        assert!(matches!(
            store.read(Folder::NeedsAction, &"bad.md".into()),
            Err(StoreError::CorruptRecord { .. })
        ));
        assert!(matches!(
            store.read(Folder::NeedsAction, &"missing.md".into()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn path_traversal_names_are_rejected() {
        let (_tmp, store) = vault();
        assert!(matches!(
            store.write(Folder::NeedsAction, &"../x.md".into(), &drop_task()),
            Err(StoreError::InvalidName(_))
        ));
    }
}
