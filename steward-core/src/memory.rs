//! In-memory [`TaskStore`] with the same semantics as the filesystem store.
//!
//! Files are kept as raw text so corrupt records can be seeded and are only
//! detected on read, exactly as on disk. One mutex guards every folder, so a
//! move is a single atomic step.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::state::{check_transition, Folder};
use crate::store::{validate_name, TaskStore};
use crate::task::Task;
use crate::types::TaskName;

type Files = BTreeMap<(Folder, TaskName), String>;

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    files: Mutex<Files>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place raw file text in a folder, bypassing the codec.
    pub fn insert_raw(&self, folder: Folder, name: impl Into<TaskName>, text: impl Into<String>) {
        self.lock().insert((folder, name.into()), text.into());
    }

    /// Raw file text, if present.
    pub fn raw(&self, folder: Folder, name: &TaskName) -> Option<String> {
        self.lock().get(&(folder, name.clone())).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Files> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskStore for MemoryTaskStore {
    fn list(&self, folder: Folder) -> Result<Vec<TaskName>, StoreError> {
        Ok(self
            .lock()
            .keys()
            .filter(|(f, name)| *f == folder && name.is_valid())
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn read(&self, folder: Folder, name: &TaskName) -> Result<Task, StoreError> {
        validate_name(name)?;
        let text = self
            .raw(folder, name)
            .ok_or_else(|| StoreError::NotFound {
                folder,
                name: name.clone(),
            })?;
        Task::parse(&text).map_err(|source| StoreError::CorruptRecord {
            path: self.task_path(folder, name),
            source,
        })
    }

    fn write(&self, folder: Folder, name: &TaskName, task: &Task) -> Result<(), StoreError> {
        validate_name(name)?;
        let text = task
            .to_markdown()
            .map_err(|source| StoreError::CorruptRecord {
                path: self.task_path(folder, name),
                source,
            })?;
        self.lock().insert((folder, name.clone()), text);
        Ok(())
    }

    fn move_task(&self, name: &TaskName, from: Folder, to: Folder) -> Result<(), StoreError> {
        check_transition(name, from, to)?;
        validate_name(name)?;
        let mut files = self.lock();
        let dst_key = (to, name.clone());
        if files.contains_key(&dst_key) {
            return Err(StoreError::MoveConflict {
                name: name.clone(),
                from,
                to,
            });
        }
        let text = files
            .remove(&(from, name.clone()))
            .ok_or_else(|| StoreError::MoveConflict {
                name: name.clone(),
                from,
                to,
            })?;
        files.insert(dst_key, text);
        Ok(())
    }

    fn task_path(&self, folder: Folder, name: &TaskName) -> PathBuf {
        PathBuf::from(folder.dir_name()).join(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDetail;
    use chrono::Utc;

    #[test]
    fn behaves_like_a_folder_tree() {
        let store = MemoryTaskStore::new();
        let name = TaskName::from("a.md");
        let task = Task::new(
            TaskDetail::Plan {
                objective: "ship".into(),
            },
            Utc::now(),
            "- [ ] 1. Ship\n",
        );
        store.write(Folder::Plans, &name, &task).unwrap();
        assert_eq!(store.read(Folder::Plans, &name).unwrap(), task);

        store.move_task(&name, Folder::Plans, Folder::Done).unwrap();
        assert_eq!(store.locate(&name).unwrap(), Some(Folder::Done));
        assert!(matches!(
            store.move_task(&name, Folder::Plans, Folder::Done),
            Err(StoreError::MoveConflict { .. })
        ));
    }

    #[test]
    fn corrupt_text_is_detected_on_read() {
        let store = MemoryTaskStore::new();
        store.insert_raw(Folder::NeedsAction, "x.md", "garbage");
        assert_eq!(store.list(Folder::NeedsAction).unwrap().len(), 1);
        assert!(matches!(
            store.read(Folder::NeedsAction, &"x.md".into()),
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
