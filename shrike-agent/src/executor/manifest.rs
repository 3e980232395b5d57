//! Path manifest for rsync's `--files-from` mode.
//!
//! One absolute path per line, newline-terminated, no escaping. The file lives
//! only as long as the [`Manifest`] handle that owns it.

use crate::models::BackupEntry;
use crate::utils::errors::{Result, SyncError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A materialized manifest. Dropping it deletes the file.
#[derive(Debug)]
pub struct Manifest {
    file: NamedTempFile,
}

impl Manifest {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The manifest path as rsync receives it.
    pub fn path_str(&self) -> Result<&str> {
        self.file
            .path()
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(self.file.path().to_string_lossy().into_owned()))
    }

    /// Read the manifest back from disk.
    pub fn read_paths(&self) -> Result<Vec<String>> {
        decode(self.path())
    }
}

/// Write entry paths into a manifest in the system temp directory.
pub fn encode(entries: &[BackupEntry]) -> Result<Manifest> {
    let file = tempfile::Builder::new()
        .prefix("shrike-manifest-")
        .suffix(".txt")
        .tempfile()?;
    write_entries(file, entries)
}

/// Write entry paths into a manifest inside `dir`.
pub fn encode_in(dir: &Path, entries: &[BackupEntry]) -> Result<Manifest> {
    std::fs::create_dir_all(dir)?;
    let file = tempfile::Builder::new()
        .prefix("shrike-manifest-")
        .suffix(".txt")
        .tempfile_in(dir)?;
    write_entries(file, entries)
}

fn write_entries(mut file: NamedTempFile, entries: &[BackupEntry]) -> Result<Manifest> {
    for entry in entries {
        writeln!(file, "{}", entry.path)?;
    }
    file.flush()?;
    Ok(Manifest { file })
}

/// Read a manifest file into its path list.
pub fn decode(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(decode_str(&content))
}

/// Split manifest text into paths, skipping blank lines.
pub fn decode_str(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
