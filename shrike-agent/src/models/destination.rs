//! Backup destination resolution.

use std::path::PathBuf;

/// Where synced content lands: `<mount_root>/<backup_dir_name>[/<device>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Cloud storage mount point
    pub mount_root: PathBuf,
    /// Folder created under the mount root
    pub backup_dir_name: String,
    /// Optional per-device folder, keeps several machines apart
    pub device_subfolder: Option<String>,
}

impl Destination {
    pub fn new(mount_root: impl Into<PathBuf>, backup_dir_name: impl Into<String>) -> Self {
        Self {
            mount_root: mount_root.into(),
            backup_dir_name: backup_dir_name.into(),
            device_subfolder: None,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device_subfolder = Some(device.into());
        self
    }

    /// Join all components into the directory handed to rsync.
    pub fn resolve(&self) -> PathBuf {
        let mut path = self.mount_root.join(&self.backup_dir_name);
        if let Some(device) = self.device_subfolder.as_deref().filter(|d| !d.is_empty()) {
            path.push(device);
        }
        path
    }
}
