//! Pre-sync validation of manifest paths and the destination directory.
//!
//! Per-path problems are collected into a [`ValidationReport`] and only become
//! fatal when nothing at all is syncable.

use crate::utils::errors::{Result, SyncError};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of checking a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "path", rename_all = "snake_case")]
pub enum PathValidation {
    Valid,
    NotFound(String),
    NotReadable(String),
    NotAbsolute(String),
}

impl PathValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, PathValidation::Valid)
    }
}

/// Result of validating a whole manifest.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Number of paths checked, duplicates included
    pub total: usize,
    /// Number of distinct valid paths
    pub valid_count: usize,
    /// Failed paths in manifest order
    pub failures: Vec<PathValidation>,
    /// Every repeat occurrence of an earlier path
    pub duplicates: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.duplicates.is_empty()
    }

    pub fn has_issues(&self) -> bool {
        !self.is_ok()
    }

    /// Human-readable one-liner for logs and error messages.
    pub fn summary(&self) -> String {
        if self.is_ok() {
            return format!("all {} paths validated successfully", self.total);
        }

        let count = |pred: fn(&PathValidation) -> bool| self.failures.iter().filter(|f| pred(f)).count();
        let not_found = count(|f| matches!(f, PathValidation::NotFound(_)));
        let not_readable = count(|f| matches!(f, PathValidation::NotReadable(_)));
        let not_absolute = count(|f| matches!(f, PathValidation::NotAbsolute(_)));

        let mut parts = Vec::new();
        if not_found > 0 {
            parts.push(format!("{not_found} not found"));
        }
        if not_readable > 0 {
            parts.push(format!("{not_readable} not readable"));
        }
        if not_absolute > 0 {
            parts.push(format!("{not_absolute} not absolute"));
        }
        if !self.duplicates.is_empty() {
            parts.push(format!("{} duplicates", self.duplicates.len()));
        }

        format!(
            "{}/{} paths valid; issues: {}",
            self.valid_count,
            self.total,
            parts.join(", ")
        )
    }
}

/// Check that a path is absolute, exists and has readable metadata.
pub fn validate_path(path: &str) -> PathValidation {
    if !path.starts_with('/') {
        return PathValidation::NotAbsolute(path.to_string());
    }

    // fs::metadata follows symlinks, so a dangling link reads as missing
    match fs::metadata(Path::new(path)) {
        Ok(_) => PathValidation::Valid,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            PathValidation::NotFound(path.to_string())
        }
        Err(e) => {
            debug!("metadata for {} unreadable: {}", path, e);
            PathValidation::NotReadable(path.to_string())
        }
    }
}

/// Validate every distinct path and report repeats separately.
pub fn validate_batch(paths: &[String]) -> ValidationReport {
    let mut seen = HashSet::new();
    let mut report = ValidationReport {
        total: paths.len(),
        ..Default::default()
    };

    for path in paths {
        if !seen.insert(path.as_str()) {
            report.duplicates.push(path.clone());
            continue;
        }

        match validate_path(path) {
            PathValidation::Valid => report.valid_count += 1,
            failure => report.failures.push(failure),
        }
    }

    report
}

/// The destination must be a directory; a missing one is created.
pub fn validate_destination(destination: &Path) -> Result<()> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::DestinationNotDirectory(
            destination.display().to_string(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Creating destination {}", destination.display());
            fs::create_dir_all(destination)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Full pre-sync check. Partial failures are returned in the report, not raised.
pub fn pre_sync_check(paths: &[String], destination: &Path) -> Result<ValidationReport> {
    if paths.is_empty() {
        return Err(SyncError::NoEntries);
    }

    let report = validate_batch(paths);

    if report.valid_count == 0 {
        return Err(SyncError::InvalidPaths {
            summary: report.summary(),
            failures: report.failures,
        });
    }

    validate_destination(destination)?;

    if report.has_issues() {
        warn!("Pre-sync check: {}", report.summary());
        for failure in &report.failures {
            warn!("Skipping unusable path: {:?}", failure);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn existing_file(dir: &TempDir, name: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, b"content").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_validate_existing_file_and_dir() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "a.txt");
        assert_eq!(validate_path(&file), PathValidation::Valid);
        assert_eq!(validate_path(dir.path().to_str().unwrap()), PathValidation::Valid);
    }

    #[test]
    fn test_validate_missing_path() {
        assert_eq!(
            validate_path("/nonexistent/abc123xyz"),
            PathValidation::NotFound("/nonexistent/abc123xyz".into())
        );
    }

    #[test]
    fn test_validate_relative_paths_rejected() {
        for path in ["relative/path.txt", "./relative/path.txt", ""] {
            assert_eq!(validate_path(path), PathValidation::NotAbsolute(path.into()));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_not_found() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        std::os::unix::fs::symlink(dir.path().join("missing"), &link).unwrap();
        let link = link.to_str().unwrap().to_string();
        assert_eq!(validate_path(&link), PathValidation::NotFound(link.clone()));
    }

    #[test]
    fn test_batch_reports_single_duplicate() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "a.txt");
        let paths = vec![file.clone(), file.clone()];

        let report = validate_batch(&paths);
        assert_eq!(report.duplicates, vec![file.clone()]);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.total, 2);
        assert!(report.failures.is_empty());
        assert!(paths.iter().all(|p| validate_path(p).is_valid()));
    }

    #[test]
    fn test_batch_does_not_short_circuit() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "a.txt");
        let paths = vec![
            "/nonexistent/x".to_string(),
            "relative.txt".to_string(),
            file.clone(),
            file,
        ];
        let report = validate_batch(&paths);
        assert_eq!(report.valid_count, 1);
        assert_eq!(
            report.failures,
            vec![
                PathValidation::NotFound("/nonexistent/x".into()),
                PathValidation::NotAbsolute("relative.txt".into()),
            ]
        );
        assert_eq!(report.duplicates.len(), 1);
    }

    #[test]
    fn test_summary_formats() {
        let clean = ValidationReport {
            total: 3,
            valid_count: 3,
            ..Default::default()
        };
        assert_eq!(clean.summary(), "all 3 paths validated successfully");

        let messy = ValidationReport {
            total: 5,
            valid_count: 2,
            failures: vec![
                PathValidation::NotFound("/a".into()),
                PathValidation::NotReadable("/b".into()),
            ],
            duplicates: vec!["/c".into()],
        };
        assert_eq!(
            messy.summary(),
            "2/5 paths valid; issues: 1 not found, 1 not readable, 1 duplicates"
        );
    }

    #[test]
    fn test_destination_created_with_parents() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        validate_destination(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_destination_file_rejected() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "not-a-dir");
        let err = validate_destination(Path::new(&file)).unwrap_err();
        assert!(matches!(err, SyncError::DestinationNotDirectory(_)));
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_pre_sync_empty_input() {
        let dir = TempDir::new().unwrap();
        let err = pre_sync_check(&[], dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::NoEntries));
    }

    #[test]
    fn test_pre_sync_all_invalid() {
        let dir = TempDir::new().unwrap();
        let err = pre_sync_check(&["/nonexistent/x".to_string()], dir.path()).unwrap_err();
        match err {
            SyncError::InvalidPaths { failures, summary } => {
                assert_eq!(failures.len(), 1);
                assert!(summary.contains("0/1"));
            }
            other => panic!("expected InvalidPaths, got {other}"),
        }
    }

    #[test]
    fn test_pre_sync_partial_failure_returns_report() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "a.txt");
        let dest = dir.path().join("dest");
        let report = pre_sync_check(&[file, "/missing".to_string()], &dest).unwrap();
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.failures, vec![PathValidation::NotFound("/missing".into())]);
        assert!(dest.is_dir());
    }

    #[test]
    fn test_pre_sync_bad_destination() {
        let dir = TempDir::new().unwrap();
        let file = existing_file(&dir, "a.txt");
        let err = pre_sync_check(&[file.clone()], Path::new(&file)).unwrap_err();
        assert!(matches!(err, SyncError::DestinationNotDirectory(_)));
    }
}
