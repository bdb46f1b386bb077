//! Sync configuration.
//!
//! All tunables of a sync run live in `SyncConfig`, which is handed to the
//! walker, the sync engine and the rotator when they are constructed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;

/// Subdirectory of the destination holding the live mirror.
pub const COPY_DIR_NAME: &str = "copy";

/// Subdirectory of the destination holding rotated backups.
pub const BACKUP_DIR_NAME: &str = "backup";

/// Number of backups kept per destination file unless configured otherwise.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Poll interval of continuous mode unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Settings for mirroring one source tree into one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root of the tree being mirrored
    pub source: PathBuf,

    /// Destination root; `copy/` and `backup/` are created beneath it
    pub destination: PathBuf,

    /// Maximum number of backups retained per destination file
    pub max_backups: usize,

    /// Time between cycle starts in continuous mode
    pub poll_interval: Duration,
}

impl SyncConfig {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Self {
        SyncConfig {
            source: source.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
            max_backups: DEFAULT_MAX_BACKUPS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Root of the live mirror, `<destination>/copy`.
    pub fn copy_root(&self) -> PathBuf {
        self.destination.join(COPY_DIR_NAME)
    }

    /// Root of the backup tree, `<destination>/backup`.
    pub fn backup_root(&self) -> PathBuf {
        self.destination.join(BACKUP_DIR_NAME)
    }

    /// Check the settings before the first cycle.
    ///
    /// # Errors
    /// Returns `SyncError::InvalidConfig` for a zero retention bound, a zero
    /// poll interval, or a destination that lies inside the source tree
    /// (which would make every cycle mirror its own output).
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_backups == 0 {
            return Err(SyncError::InvalidConfig {
                reason: "max_backups must be at least 1".to_string(),
            });
        }

        if self.poll_interval.is_zero() {
            return Err(SyncError::InvalidConfig {
                reason: "poll interval must be greater than zero".to_string(),
            });
        }

        if self.destination.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig {
                reason: "destination path is empty".to_string(),
            });
        }

        let source = absolute(&self.source);
        let destination = absolute(&self.destination);
        if destination.starts_with(&source) {
            return Err(SyncError::InvalidConfig {
                reason: format!(
                    "destination {} lies inside source {}",
                    self.destination.display(),
                    self.source.display()
                ),
            });
        }

        Ok(())
    }
}

// Canonical form when the path exists; otherwise the canonical parent joined
// with the final component, so a not-yet-created destination still compares.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            absolute(parent).join(name)
        }
        _ => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}
