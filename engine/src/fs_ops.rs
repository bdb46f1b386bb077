//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Creating directories recursively
//! - Copying files with their modification time carried forward

use filetime::FileTime;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Copy a file from source to destination, preserving its modification time.
///
/// The data is written to a staging file next to `dst` and renamed into
/// place, so `dst` is either absent, the old file, or the complete new file.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns SyncError if the copy fails; the staging file is removed.
pub fn copy_file_preserving_mtime(src: &Path, dst: &Path) -> Result<u64, SyncError> {
    stage_copy(src, dst)?.commit()
}

/// Copy `src` into a staging file next to `dst` without touching `dst`.
///
/// # Errors
/// Returns SyncError if the copy fails; the staging file is removed.
pub fn stage_copy(src: &Path, dst: &Path) -> Result<StagedCopy, SyncError> {
    ensure_parent_dir_exists(dst)?;

    let staging = staging_path(dst);
    match copy_into(src, &staging) {
        Ok(bytes) => Ok(StagedCopy {
            staging,
            destination: dst.to_path_buf(),
            bytes,
            committed: false,
        }),
        Err(e) => {
            let _ = fs::remove_file(&staging);
            Err(e)
        }
    }
}

/// A fully written copy waiting to be renamed over its destination.
///
/// Dropped without `commit`, the staging file is deleted.
#[derive(Debug)]
pub struct StagedCopy {
    staging: PathBuf,
    destination: PathBuf,
    bytes: u64,
    committed: bool,
}

impl StagedCopy {
    /// Rename the staged file into place.
    ///
    /// # Returns
    /// Number of bytes copied
    pub fn commit(mut self) -> Result<u64, SyncError> {
        fs::rename(&self.staging, &self.destination).map_err(|e| SyncError::WriteError {
            path: self.destination.clone(),
            source: e,
        })?;
        self.committed = true;
        Ok(self.bytes)
    }
}

impl Drop for StagedCopy {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staging);
        }
    }
}

fn copy_into(src: &Path, dst: &Path) -> Result<u64, SyncError> {
    let mut src_file = fs::File::open(src).map_err(|e| SyncError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file
        .metadata()
        .and_then(|m| m.modified())
        .map_err(|e| SyncError::ReadError {
            path: src.to_path_buf(),
            source: e,
        })?;

    let mut dst_file = fs::File::create(dst).map_err(|e| SyncError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            SyncError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            SyncError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;

    // Close before stamping so no later flush bumps the mtime
    drop(dst_file);

    // The next cycle compares timestamps for equality, so this must not fail silently
    filetime::set_file_mtime(dst, FileTime::from_system_time(src_mtime)).map_err(|e| {
        SyncError::WriteError {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;

    Ok(bytes_copied)
}

/// `<dir>/.<name>.autosync-partial`
fn staging_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".autosync-partial");
    dst.with_file_name(name)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns SyncError if directory creation fails
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), SyncError> {
    match path.parent() {
        // Skip if parent is empty path (relative root)
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Ensure a directory exists, creating it and its ancestors if necessary.
///
/// # Errors
/// Returns SyncError if the path is occupied by a file or creation fails
pub fn ensure_dir_exists(dir: &Path) -> Result<(), SyncError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| SyncError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(SyncError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}
