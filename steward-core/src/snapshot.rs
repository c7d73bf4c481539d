//! Point-in-time view of every folder, used for projections and status output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::state::Folder;
use crate::store::TaskStore;
use crate::task::Task;
use crate::types::TaskName;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub name: TaskName,
    /// `None` when the file could not be decoded.
    pub task: Option<Task>,
}

/// Contents of every folder at capture time. Folders iterate in workflow order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    /// Clock reading used for lazy expiry checks on this snapshot.
    pub captured_at: DateTime<Utc>,
    folders: BTreeMap<Folder, Vec<SnapshotEntry>>,
}

impl StoreSnapshot {
    /// Read every task in every folder. Corrupt files are kept with `task: None`;
    /// files that vanish mid-capture are left out.
    pub fn capture(store: &impl TaskStore, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let mut folders = BTreeMap::new();
        for folder in Folder::ALL {
            let mut entries = Vec::new();
            for name in store.list(folder)? {
                let task = match store.read(folder, &name) {
                    Ok(task) => Some(task),
                    Err(StoreError::CorruptRecord { .. }) => None,
                    Err(StoreError::NotFound { .. }) => continue,
                    Err(e) => return Err(e),
                };
                entries.push(SnapshotEntry { name, task });
            }
            folders.insert(folder, entries);
        }
        Ok(Self {
            captured_at: now,
            folders,
        })
    }

    /// Build directly from entries (tests, synthetic projections).
    pub fn from_entries(
        now: DateTime<Utc>,
        entries: impl IntoIterator<Item = (Folder, SnapshotEntry)>,
    ) -> Self {
        let mut folders: BTreeMap<Folder, Vec<SnapshotEntry>> = BTreeMap::new();
        for (folder, entry) in entries {
            folders.entry(folder).or_default().push(entry);
        }
        for entries in folders.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Self {
            captured_at: now,
            folders,
        }
    }

    pub fn entries(&self, folder: Folder) -> &[SnapshotEntry] {
        self.folders.get(&folder).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, folder: Folder) -> usize {
        self.entries(folder).len()
    }

    pub fn total(&self) -> usize {
        self.folders.values().map(Vec::len).sum()
    }

    /// Decoded tasks in `folder`, skipping corrupt entries.
    pub fn tasks(&self, folder: Folder) -> impl Iterator<Item = (&TaskName, &Task)> {
        self.entries(folder)
            .iter()
            .filter_map(|e| e.task.as_ref().map(|t| (&e.name, t)))
    }

    pub fn corrupt(&self) -> impl Iterator<Item = (Folder, &TaskName)> {
        self.folders.iter().flat_map(|(folder, entries)| {
            entries
                .iter()
                .filter(|e| e.task.is_none())
                .map(move |e| (*folder, &e.name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTaskStore;
    use crate::task::TaskDetail;
    use chrono::Utc;

    #[test]
    fn capture_keeps_corrupt_entries_without_a_task() {
        let store = MemoryTaskStore::new();
        store.insert_raw(Folder::NeedsAction, "bad.md", "oops");
        let task = Task::new(
            TaskDetail::LinkedinPost {
                content: "hello".into(),
            },
            Utc::now(),
            "",
        );
        store
            .write(Folder::InProgress, &"post.md".into(), &task)
            .unwrap();

        let snap = StoreSnapshot::capture(&store, Utc::now()).unwrap();
        assert_eq!(snap.count(Folder::NeedsAction), 1);
        assert_eq!(snap.tasks(Folder::NeedsAction).count(), 0);
        assert_eq!(snap.tasks(Folder::InProgress).count(), 1);
        assert_eq!(snap.corrupt().count(), 1);
        assert_eq!(snap.total(), 2);
    }
}
