//! Backup entry persistence.
//!
//! The pipeline only ever sees an owned snapshot of the entries; stores hand
//! that snapshot out and take last-synced updates back.

pub mod json;

pub use json::JsonEntryStore;

use crate::models::{BackupEntry, EntryKind};
use crate::utils::errors::{Result, SyncError};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub trait EntryStore: Send + Sync + 'static {
    fn load_entries(&self) -> Result<Vec<BackupEntry>>;

    /// Read-modify-write under the store's exclusive lock. The list is written
    /// back only when `f` succeeds.
    fn update(&self, f: &mut dyn FnMut(&mut Vec<BackupEntry>) -> Result<()>) -> Result<()>;

    fn save_entries(&self, entries: &[BackupEntry]) -> Result<()> {
        self.update(&mut |current| {
            *current = entries.to_vec();
            Ok(())
        })
    }

    /// Track a new path. Symlinks and relative segments are resolved first.
    fn add_entry(&self, path: &str) -> Result<BackupEntry> {
        let canonical = match fs::canonicalize(Path::new(path)) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let kind = if fs::metadata(&canonical)?.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let canonical = canonical
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(canonical.to_string_lossy().into_owned()))?
            .to_string();

        let entry = BackupEntry::new(canonical, kind);
        self.update(&mut |entries| {
            if entries.iter().any(|e| e.path == entry.path) {
                return Err(SyncError::DuplicateEntry(entry.path.clone()));
            }
            entries.push(entry.clone());
            Ok(())
        })?;
        Ok(entry)
    }

    fn remove_entry(&self, id: Uuid) -> Result<()> {
        self.update(&mut |entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() == before {
                return Err(SyncError::EntryNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Stamp `last_synced` on the given entries.
    fn record_synced(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        self.update(&mut |entries| {
            for entry in entries.iter_mut().filter(|e| ids.contains(&e.id)) {
                entry.last_synced = Some(at);
            }
            Ok(())
        })
    }
}

/// In-process store, used when embedding the agent and in tests.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    entries: Mutex<Vec<BackupEntry>>,
}

impl MemoryEntryStore {
    pub fn new(entries: Vec<BackupEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl EntryStore for MemoryEntryStore {
    fn load_entries(&self) -> Result<Vec<BackupEntry>> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .map_err(|e| SyncError::Store(e.to_string()))
    }

    fn update(&self, f: &mut dyn FnMut(&mut Vec<BackupEntry>) -> Result<()>) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| SyncError::Store(e.to_string()))?;
        let mut entries = guard.clone();
        f(&mut entries)?;
        *guard = entries;
        Ok(())
    }
}
