use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a backup entry points at a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single file or directory tracked for backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: Uuid,
    /// Absolute path on the local filesystem
    pub path: String,
    pub kind: EntryKind,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

impl BackupEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            kind,
            added_at: Utc::now(),
            last_synced: None,
        }
    }
}
