//! Error types for the sync engine.
//!
//! `SyncError` covers everything that can go wrong while mirroring. Errors
//! raised while handling a single file never leave the Sync Engine as `Err`;
//! they are folded into a `FileFailure` so the walk can continue. Only
//! directory-level errors and configuration errors propagate to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while synchronizing a tree.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source root does not exist
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Failed to list the entries of a directory
    #[error("Failed to enumerate directory {}: {source}", path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to read timestamps or attributes of a file
    #[error("Failed to read attributes of {}: {source}", path.display())]
    AttributesUnavailable { path: PathBuf, source: io::Error },

    /// Failed to read from source file
    #[error("Failed to read {}: {source}", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to destination file
    #[error("Failed to write {}: {source}", path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Failed to create a directory
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to move, list or evict a backup
    #[error("Backup of {} failed: {source}", path.display())]
    BackupFailed { path: PathBuf, source: io::Error },

    /// A directory sits where the mirrored file should go
    #[error("Destination is a directory: {}", path.display())]
    DestinationIsDirectory { path: PathBuf },

    /// Backup suffix did not format to a fixed-width timestamp
    #[error("Backup timestamp '{stamp}' is not {width} digits wide")]
    InvalidBackupStamp { stamp: String, width: usize },

    /// Rejected configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl SyncError {
    /// The underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::EnumerationFailed { source, .. }
            | Self::AttributesUnavailable { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::BackupFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// True when the failure was caused by missing access rights.
    pub fn is_permission_denied(&self) -> bool {
        self.io_error()
            .map(|e| e.kind() == io::ErrorKind::PermissionDenied)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_detected() {
        let err = SyncError::ReadError {
            path: PathBuf::from("a.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
        };
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("a.txt"));
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_errors_without_io_source() {
        let err = SyncError::DestinationIsDirectory {
            path: PathBuf::from("dir"),
        };
        assert!(!err.is_permission_denied());
        assert_eq!(err.raw_os_error(), None);
    }

    #[test]
    fn test_raw_os_error_passthrough() {
        let err = SyncError::WriteError {
            path: PathBuf::from("b.txt"),
            source: io::Error::from_raw_os_error(13),
        };
        assert_eq!(err.raw_os_error(), Some(13));
    }
}
