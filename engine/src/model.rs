//! Core data model for sync cycles.
//!
//! This module defines the per-cycle data structures:
//! - FileEntry: the (source, destination, backup base) triple for one file
//! - SyncDecision: what a file needs, derived from timestamps
//! - SyncOutcome / SkipReason / FileFailure: the typed result of syncing one file
//! - CycleReport: the aggregate of one full traversal
//!
//! Nothing here outlives a cycle; every value is recomputed from disk.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::SyncError;

/// One file to be synchronized, with all paths already mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full source path
    pub source: PathBuf,

    /// Full path of the live copy
    pub destination: PathBuf,

    /// Full path backups are named after (suffix appended on rotation)
    pub backup_base: PathBuf,
}

impl FileEntry {
    /// Map a file name under the three directories of the current level.
    pub fn new(name: &Path, source_dir: &Path, copy_dir: &Path, backup_dir: &Path) -> Self {
        FileEntry {
            source: source_dir.join(name),
            destination: copy_dir.join(name),
            backup_base: backup_dir.join(name),
        }
    }
}

/// What needs to happen to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Destination missing; copy it
    Create,
    /// Destination present with a different modification time; back up and copy
    Update,
    /// Timestamps equal; nothing to do
    Skip,
}

impl SyncDecision {
    /// Compare the source timestamp with the destination's, if it exists.
    ///
    /// Equality is the only change signal: an older source still updates.
    pub fn decide(source_modified: SystemTime, destination_modified: Option<SystemTime>) -> Self {
        match destination_modified {
            None => SyncDecision::Create,
            Some(dst) if dst != source_modified => SyncDecision::Update,
            Some(_) => SyncDecision::Skip,
        }
    }
}

/// Why a source file was excluded from mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Hidden,
    Temporary,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Hidden => write!(f, "hidden"),
            Exclusion::Temporary => write!(f, "temporary"),
        }
    }
}

/// Why no copy was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Timestamps already match
    Unchanged,
    /// Source carries an excluding attribute
    Excluded(Exclusion),
}

/// A file that could not be synchronized in this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Source file the failure belongs to
    pub source: PathBuf,

    /// Human-readable error message
    pub message: String,

    /// True if access was denied
    pub permission_denied: bool,

    /// OS error code, if any
    pub os_error: Option<i32>,
}

impl FileFailure {
    pub fn from_error(source: &Path, err: &SyncError) -> Self {
        FileFailure {
            source: source.to_path_buf(),
            message: err.to_string(),
            permission_denied: err.is_permission_denied(),
            os_error: err.raw_os_error(),
        }
    }
}

/// Result of synchronizing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Copied to a previously absent destination
    Created,
    /// Previous destination rotated to `backup`, then overwritten
    Updated { backup: PathBuf },
    /// Left alone
    Skipped(SkipReason),
    /// Error while handling this file; the cycle continues
    Failed(FileFailure),
}

impl SyncOutcome {
    /// True if the destination was written.
    pub fn is_change(&self) -> bool {
        matches!(self, SyncOutcome::Created | SyncOutcome::Updated { .. })
    }
}

/// Summary of one traversal of the source tree.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Source root of the cycle
    pub source_root: PathBuf,

    /// When the cycle started
    pub started_at: DateTime<Local>,

    /// When the cycle finished (None while running)
    pub finished_at: Option<DateTime<Local>>,

    /// Files copied to a new destination
    pub created: usize,

    /// Files overwritten after rotation
    pub updated: usize,

    /// Files whose timestamps already matched
    pub unchanged: usize,

    /// Files skipped because of their attributes
    pub excluded: usize,

    /// Backups written during this cycle
    pub backups: Vec<PathBuf>,

    /// Files that failed
    pub failures: Vec<FileFailure>,
}

impl CycleReport {
    pub fn new(source_root: &Path, started_at: DateTime<Local>) -> Self {
        CycleReport {
            source_root: source_root.to_path_buf(),
            started_at,
            finished_at: None,
            created: 0,
            updated: 0,
            unchanged: 0,
            excluded: 0,
            backups: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Fold one file's outcome into the totals.
    pub fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated { backup } => {
                self.updated += 1;
                self.backups.push(backup.clone());
            }
            SyncOutcome::Skipped(SkipReason::Unchanged) => self.unchanged += 1,
            SyncOutcome::Skipped(SkipReason::Excluded(_)) => self.excluded += 1,
            SyncOutcome::Failed(failure) => self.failures.push(failure.clone()),
        }
    }

    /// Number of files visited.
    pub fn files_seen(&self) -> usize {
        self.created + self.updated + self.unchanged + self.excluded + self.failures.len()
    }

    /// Number of files written.
    pub fn changes(&self) -> usize {
        self.created + self.updated
    }

    /// Wall time of the cycle, if finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
