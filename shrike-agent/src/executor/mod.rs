//! Sync orchestrator - runs the manifest -> validation -> rsync pipeline.
//!
//! At most one sync is ever in flight. Callers in one process share a single
//! [`SyncOrchestrator`]; separate processes (the CLI next to a running
//! service) also contend for an exclusive `flock` on a shared lock file.
//! Whoever loses gets [`SyncError::SyncAlreadyRunning`] straight away.

pub mod manifest;
pub mod rsync;
pub mod validation;

use crate::models::{BackupEntry, SyncResult, SyncSnapshot, SyncStatus};
use crate::utils::errors::{Result, SyncError};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use rsync::SyncRunner;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

#[derive(Debug, Default)]
struct SyncState {
    running: bool,
    last_result: Option<SyncResult>,
    last_error: Option<String>,
}

/// Proof that the caller owns the Running state. Dropping it returns to Idle.
pub struct SyncGuard {
    state: Arc<Mutex<SyncState>>,
    file_lock: Option<Flock<File>>,
    released: bool,
}

impl SyncGuard {
    /// Record the outcome and go back to Idle under one lock.
    fn complete(mut self, outcome: &Result<SyncResult>) {
        let mut state = lock(&self.state);
        drop(self.file_lock.take());
        match outcome {
            Ok(result) => {
                state.last_result = Some(result.clone());
                state.last_error = None;
            }
            Err(e) => state.last_error = Some(e.to_string()),
        }
        state.running = false;
        self.released = true;
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        drop(self.file_lock.take());
        if !self.released {
            lock(&self.state).running = false;
        }
    }
}

fn lock(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    // A panicking sync must not wedge the status forever
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn acquire_file_lock(path: &Path) -> Result<Flock<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;

    Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| match errno {
        Errno::EWOULDBLOCK => SyncError::SyncAlreadyRunning,
        other => SyncError::Io(other.into()),
    })
}

/// Owns the sync status and drives the pipeline.
#[derive(Clone)]
pub struct SyncOrchestrator {
    runner: Arc<dyn SyncRunner>,
    work_dir: Option<PathBuf>,
    lock_file: Option<PathBuf>,
    state: Arc<Mutex<SyncState>>,
}

impl SyncOrchestrator {
    pub fn new(runner: Arc<dyn SyncRunner>) -> Self {
        Self {
            runner,
            work_dir: None,
            lock_file: None,
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    /// Write manifests under `dir` instead of the system temp directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Also hold an exclusive lock on `path` for the whole run, so orchestrators
    /// in other processes pointing at the same file are rejected too.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    /// Flip Idle -> Running, or fail if a sync is in flight.
    pub fn begin(&self) -> Result<SyncGuard> {
        let mut state = lock(&self.state);
        if state.running {
            return Err(SyncError::SyncAlreadyRunning);
        }
        let file_lock = self.lock_file.as_deref().map(acquire_file_lock).transpose()?;
        state.running = true;
        Ok(SyncGuard {
            state: Arc::clone(&self.state),
            file_lock,
            released: false,
        })
    }

    /// Run a full sync on the calling thread. Blocks until rsync exits.
    pub fn trigger_sync(&self, entries: &[BackupEntry], destination: &Path) -> Result<SyncResult> {
        let guard = self.begin()?;
        self.run_guarded(guard, entries, destination)
    }

    /// Claim the Running state here, then run the pipeline on the blocking pool.
    pub async fn trigger(&self, entries: Vec<BackupEntry>, destination: PathBuf) -> Result<SyncResult> {
        let guard = self.begin()?;
        let this = self.clone();

        let joined = tokio::task::spawn_blocking(move || {
            this.run_guarded(guard, &entries, &destination)
        })
        .await;

        joined.unwrap_or_else(|e| {
            error!("Sync worker panicked: {}", e);
            let err = SyncError::Join(e.to_string());
            lock(&self.state).last_error = Some(err.to_string());
            Err(err)
        })
    }

    fn run_guarded(&self, guard: SyncGuard, entries: &[BackupEntry], destination: &Path) -> Result<SyncResult> {
        info!(
            "Starting sync of {} entries to {}",
            entries.len(),
            destination.display()
        );

        let outcome = self.run_pipeline(entries, destination);
        match &outcome {
            Ok(result) => info!(
                "Sync completed: {} files, {} dirs, {} bytes",
                result.files_transferred, result.dirs_transferred, result.bytes_transferred
            ),
            Err(e) => error!("Sync failed: {}", e),
        }

        guard.complete(&outcome);
        outcome
    }

    fn run_pipeline(&self, entries: &[BackupEntry], destination: &Path) -> Result<SyncResult> {
        let manifest = match &self.work_dir {
            Some(dir) => manifest::encode_in(dir, entries)?,
            None => manifest::encode(entries)?,
        };

        // Validate what rsync will actually read, not the in-memory list
        let paths = manifest.read_paths()?;
        validation::pre_sync_check(&paths, destination)?;

        let destination = destination
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(destination.to_string_lossy().into_owned()))?;
        let args = rsync::build_arguments(manifest.path_str()?, destination);

        self.runner.run(&args)
    }

    pub fn status(&self) -> SyncStatus {
        if lock(&self.state).running {
            SyncStatus::Running
        } else {
            SyncStatus::Idle
        }
    }

    pub fn last_result(&self) -> Option<SyncResult> {
        lock(&self.state).last_result.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let state = lock(&self.state);
        SyncSnapshot {
            status: if state.running {
                SyncStatus::Running
            } else {
                SyncStatus::Idle
            },
            last_result: state.last_result.clone(),
            last_error: state.last_error.clone(),
        }
    }
}
