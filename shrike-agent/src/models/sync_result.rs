use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a completed rsync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Files listed in rsync's verbose output
    pub files_transferred: u64,
    /// Directories listed in rsync's verbose output
    pub dirs_transferred: u64,
    /// Bytes reported by the `sent N bytes` summary line
    pub bytes_transferred: u64,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub synced_at: DateTime<Utc>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Running,
}

/// Point-in-time view of the orchestrator, served by `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub last_result: Option<SyncResult>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_code(exit_code: i32) -> SyncResult {
        SyncResult {
            files_transferred: 3,
            dirs_transferred: 1,
            bytes_transferred: 4096,
            stdout: "sending incremental file list\nfile1.txt\n".into(),
            stderr: String::new(),
            exit_code,
            synced_at: Utc::now(),
        }
    }

    #[test]
    fn test_success_depends_on_exit_code() {
        assert!(result_with_code(0).is_success());
        assert!(!result_with_code(23).is_success());
    }

    #[test]
    fn test_sync_result_wire_shape() {
        let json = serde_json::to_value(result_with_code(0)).unwrap();
        assert_eq!(json["files_transferred"], 3);
        assert_eq!(json["dirs_transferred"], 1);
        assert_eq!(json["bytes_transferred"], 4096);
        assert_eq!(json["exit_code"], 0);
        assert!(json["synced_at"].is_string());
        assert!(json["stdout"].as_str().unwrap().contains("file1.txt"));
    }

    #[test]
    fn test_snapshot_serializes_nulls() {
        let snapshot = SyncSnapshot {
            status: SyncStatus::Running,
            last_result: None,
            last_error: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json["last_result"].is_null());
        assert!(json["last_error"].is_null());
    }
}
