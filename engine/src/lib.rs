//! # AutoSync Engine - One-Way Mirroring Library
//!
//! A headless engine that mirrors a source directory tree into a destination,
//! keeping rotated backups of every file it overwrites.
//!
//! ## Overview
//!
//! - Recursive traversal with per-file error isolation
//! - Change detection by modification-time equality
//! - Copies carry the source modification time forward
//! - Overwritten files are moved to `<dest>/backup/...` as `<name>.bak_<yyMMddHHmmss>`
//! - At most `max_backups` backups per file, oldest evicted first
//! - Hidden and temporary source files are ignored
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{SyncConfig, TreeWalker};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("/data/source", "/mnt/mirror").with_max_backups(5);
//! config.validate()?;
//!
//! let walker = TreeWalker::new(config);
//! let report = walker.run_cycle(None)?;
//! println!("{} created, {} updated", report.created, report.updated);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **config**: Sync settings and destination layout
//! - **model**: Per-cycle data structures (FileEntry, SyncOutcome, CycleReport)
//! - **error**: Error types
//! - **attributes**: File attribute lookup and exclusion flags
//! - **fs_ops**: Low-level filesystem operations
//! - **backup**: Backup naming and rotation
//! - **sync**: Per-file sync decisions
//! - **walker**: Tree traversal and cycle reports
//! - **observer**: Event callback trait
//! - **clock**: Time source
//! - **schedule**: Poll cadence for continuous mode

pub mod attributes;
pub mod backup;
pub mod clock;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod model;
pub mod observer;
pub mod schedule;
pub mod sync;
pub mod walker;

// Re-export main types
pub use attributes::{FileAttributeSource, FileAttributes, OsAttributes};
pub use backup::BackupRotator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{SyncConfig, DEFAULT_MAX_BACKUPS, DEFAULT_POLL_INTERVAL};
pub use error::SyncError;
pub use model::{
    CycleReport, Exclusion, FileEntry, FileFailure, SkipReason, SyncDecision, SyncOutcome,
};
pub use observer::SyncObserver;
pub use schedule::PollSchedule;
pub use sync::SyncEngine;
pub use walker::TreeWalker;
