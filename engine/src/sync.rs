//! Per-file synchronization.
//!
//! `SyncEngine::sync` takes one `FileEntry` and brings its destination up to
//! date: create it, rotate and overwrite it, or leave it alone. Every error
//! is returned inside the outcome so the caller can move on to the next file.

use std::io;
use std::path::Path;
use tracing::debug;

use crate::attributes::{FileAttributeSource, FileAttributes, OsAttributes};
use crate::backup::BackupRotator;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fs_ops;
use crate::model::{FileEntry, FileFailure, SkipReason, SyncDecision, SyncOutcome};

/// Decides and performs the sync of single files.
pub struct SyncEngine {
    rotator: BackupRotator,
    attributes: Box<dyn FileAttributeSource>,
}

impl SyncEngine {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_attributes(config, Box::new(OsAttributes))
    }

    /// Build an engine reading attributes from `attributes`.
    pub fn with_attributes(config: &SyncConfig, attributes: Box<dyn FileAttributeSource>) -> Self {
        SyncEngine {
            rotator: BackupRotator::new(config.max_backups),
            attributes,
        }
    }

    /// Synchronize one file.
    ///
    /// Never panics on I/O trouble; failures come back as
    /// `SyncOutcome::Failed`.
    pub fn sync(&self, entry: &FileEntry) -> SyncOutcome {
        match self.try_sync(entry) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(file = %entry.source.display(), error = %e, "sync failed");
                SyncOutcome::Failed(FileFailure::from_error(&entry.source, &e))
            }
        }
    }

    fn try_sync(&self, entry: &FileEntry) -> Result<SyncOutcome, SyncError> {
        let src = self
            .attributes
            .attributes(&entry.source)
            .map_err(|e| SyncError::AttributesUnavailable {
                path: entry.source.clone(),
                source: e,
            })?;

        if let Some(exclusion) = src.exclusion() {
            debug!(file = %entry.source.display(), %exclusion, "excluded");
            return Ok(SyncOutcome::Skipped(SkipReason::Excluded(exclusion)));
        }

        fs_ops::ensure_parent_dir_exists(&entry.destination)?;

        let dst = self.destination_attributes(&entry.destination)?;
        if let Some(dst) = dst {
            if dst.is_dir {
                return Err(SyncError::DestinationIsDirectory {
                    path: entry.destination.clone(),
                });
            }
        }

        let dst_modified = dst.map(|d| d.modified);
        match (SyncDecision::decide(src.modified, dst_modified), dst_modified) {
            (SyncDecision::Create, _) => {
                fs_ops::copy_file_preserving_mtime(&entry.source, &entry.destination)?;
                Ok(SyncOutcome::Created)
            }
            (SyncDecision::Update, Some(dst_modified)) => {
                // Nothing is rotated until the new data is safely on disk
                let staged = fs_ops::stage_copy(&entry.source, &entry.destination)?;
                let backup = self
                    .rotator
                    .rotate(&entry.destination, dst_modified, &entry.backup_base)?;
                if let Err(e) = staged.commit() {
                    let _ = std::fs::rename(&backup, &entry.destination);
                    return Err(e);
                }
                Ok(SyncOutcome::Updated { backup })
            }
            (SyncDecision::Skip, _) | (SyncDecision::Update, None) => {
                Ok(SyncOutcome::Skipped(SkipReason::Unchanged))
            }
        }
    }

    fn destination_attributes(&self, path: &Path) -> Result<Option<FileAttributes>, SyncError> {
        match self.attributes.attributes(path) {
            Ok(attrs) => Ok(Some(attrs)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::AttributesUnavailable {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
