//! Backup rotation.
//!
//! Before a changed destination file is overwritten it is renamed into the
//! backup tree as `<name>.bak_<yyMMddHHmmss>`, stamped with its own
//! modification time. At most `max_backups` such files are kept per name;
//! the oldest is evicted first.
//!
//! Eviction picks the lexicographically smallest name. That is only the
//! oldest because the stamp is a fixed-width, zero-padded number, so both
//! naming and matching insist on exactly `BACKUP_STAMP_WIDTH` digits.

use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::error::SyncError;
use crate::fs_ops;

/// Separator between the original file name and the timestamp.
pub const BACKUP_MARKER: &str = ".bak_";

/// chrono format of the backup timestamp.
pub const BACKUP_STAMP_FORMAT: &str = "%y%m%d%H%M%S";

/// Width of a formatted backup timestamp.
pub const BACKUP_STAMP_WIDTH: usize = 12;

/// Format a modification time as a backup suffix stamp (local time).
///
/// # Errors
/// Returns `SyncError::InvalidBackupStamp` if the result is not a
/// fixed-width digit string.
pub fn backup_stamp(modified: SystemTime) -> Result<String, SyncError> {
    let stamp = DateTime::<Local>::from(modified)
        .format(BACKUP_STAMP_FORMAT)
        .to_string();
    if is_valid_stamp(&stamp) {
        Ok(stamp)
    } else {
        Err(SyncError::InvalidBackupStamp {
            stamp,
            width: BACKUP_STAMP_WIDTH,
        })
    }
}

fn is_valid_stamp(stamp: &str) -> bool {
    stamp.len() == BACKUP_STAMP_WIDTH && stamp.bytes().all(|b| b.is_ascii_digit())
}

/// Split a backup file name into `(original name, stamp)`.
///
/// Returns None for names that are not managed backups.
pub fn parse_backup_name(file_name: &str) -> Option<(&str, &str)> {
    let (base, stamp) = file_name.rsplit_once(BACKUP_MARKER)?;
    if base.is_empty() || !is_valid_stamp(stamp) {
        return None;
    }
    Some((base, stamp))
}

/// Full path of the backup of `backup_base` with the given stamp.
pub fn backup_path(backup_base: &Path, stamp: &str) -> PathBuf {
    let mut name = OsString::from(backup_base.file_name().unwrap_or_default());
    name.push(BACKUP_MARKER);
    name.push(stamp);
    backup_base.with_file_name(name)
}

/// Moves destination files into the backup tree and enforces retention.
#[derive(Debug, Clone, Copy)]
pub struct BackupRotator {
    max_backups: usize,
}

impl BackupRotator {
    pub fn new(max_backups: usize) -> Self {
        BackupRotator { max_backups }
    }

    /// Existing backups of `backup_base`, oldest first.
    ///
    /// A missing backup directory means no backups.
    pub fn existing_backups(&self, backup_base: &Path) -> Result<Vec<PathBuf>, SyncError> {
        let base_name = match backup_base.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return Ok(Vec::new()),
        };
        let dir = match backup_base.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SyncError::BackupFailed {
                    path: backup_base.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::BackupFailed {
                path: backup_base.to_path_buf(),
                source: e,
            })?;
            let file_name = entry.file_name();
            let matches = file_name
                .to_str()
                .and_then(parse_backup_name)
                .map(|(base, _)| base == base_name)
                .unwrap_or(false);
            if matches && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(file_name);
            }
        }

        names.sort();
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }

    /// Rotate `dest_file` into the backup tree.
    ///
    /// `dest_modified` is the destination's current modification time and
    /// names the backup. Existing backups are evicted oldest-first until
    /// there is room for the new one.
    ///
    /// # Returns
    /// Path of the new backup
    ///
    /// # Errors
    /// Returns SyncError if the backup directory cannot be created, an old
    /// backup cannot be removed, or the move fails. `dest_file` is left in
    /// place on error.
    pub fn rotate(
        &self,
        dest_file: &Path,
        dest_modified: SystemTime,
        backup_base: &Path,
    ) -> Result<PathBuf, SyncError> {
        fs_ops::ensure_parent_dir_exists(backup_base)?;

        let mut backups = self.existing_backups(backup_base)?;
        while backups.len() >= self.max_backups.max(1) {
            let oldest = backups.remove(0);
            debug!(backup = %oldest.display(), "evicting oldest backup");
            remove_backup(&oldest)?;
        }

        let target = backup_path(backup_base, &backup_stamp(dest_modified)?);

        // Same-second rotation of the same file
        if target.exists() {
            remove_backup(&target)?;
        }

        fs::rename(dest_file, &target).map_err(|e| SyncError::BackupFailed {
            path: dest_file.to_path_buf(),
            source: e,
        })?;

        Ok(target)
    }
}

fn remove_backup(path: &Path) -> Result<(), SyncError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::BackupFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
