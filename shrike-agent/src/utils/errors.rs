//! Error taxonomy for the sync agent.

use crate::executor::validation::PathValidation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no entries to sync")]
    NoEntries,

    #[error("no valid paths to sync: {summary}")]
    InvalidPaths {
        summary: String,
        failures: Vec<PathValidation>,
    },

    #[error("destination is not a directory: {0}")]
    DestinationNotDirectory(String),

    #[error("rsync error (exit code {exit_code}): {stderr}")]
    SubprocessFailure { exit_code: i32, stderr: String },

    #[error("rsync did not finish within {secs} seconds")]
    SubprocessTimeout { secs: u64 },

    #[error("a sync is already running")]
    SyncAlreadyRunning,

    #[error("unauthorized")]
    AuthFailure,

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("path does not exist: {0}")]
    NotFound(String),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sync worker failed: {0}")]
    Join(String),
}

impl SyncError {
    /// Stable reason code exposed to remote callers.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NoEntries => "no_entries",
            SyncError::InvalidPaths { .. } => "invalid_path",
            SyncError::DestinationNotDirectory(_) => "destination_not_directory",
            SyncError::SubprocessFailure { .. } => "subprocess_failure",
            SyncError::SubprocessTimeout { .. } => "subprocess_timeout",
            SyncError::SyncAlreadyRunning => "sync_already_running",
            SyncError::AuthFailure => "unauthorized",
            SyncError::NonUtf8Path(_) => "non_utf8_path",
            SyncError::NotFound(_) => "not_found",
            SyncError::DuplicateEntry(_) => "duplicate_entry",
            SyncError::EntryNotFound(_) => "entry_not_found",
            SyncError::Config(_) => "config",
            SyncError::Store(_) => "store",
            SyncError::Io(_) => "io",
            SyncError::Json(_) => "serialization",
            SyncError::Join(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
