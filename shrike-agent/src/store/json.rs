//! JSON file store: a single array of entries, rewritten atomically.
//!
//! Writers from any process serialize on an exclusive `flock` of the sidecar
//! `<file>.lock`, held across the whole read-modify-write.

use super::EntryStore;
use crate::models::BackupEntry;
use crate::utils::errors::{Result, SyncError};
use nix::fcntl::{Flock, FlockArg};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct JsonEntryStore {
    path: PathBuf,
}

impl JsonEntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    fn lock_exclusive(&self) -> Result<Flock<File>> {
        std::fs::create_dir_all(self.dir())?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| SyncError::Store(format!("cannot lock {}: {}", lock_path.display(), errno)))
    }

    fn read(&self) -> Result<Vec<BackupEntry>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, entries: &[BackupEntry]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(self.dir())?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| SyncError::Store(format!("{}: {}", self.path.display(), e)))?;

        debug!("Saved {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl EntryStore for JsonEntryStore {
    // Readers never lock; writes land by rename
    fn load_entries(&self) -> Result<Vec<BackupEntry>> {
        self.read()
    }

    fn update(&self, f: &mut dyn FnMut(&mut Vec<BackupEntry>) -> Result<()>) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        let mut entries = self.read()?;
        f(&mut entries)?;
        self.write(&entries)
    }
}
