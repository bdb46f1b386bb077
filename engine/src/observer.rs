//! Sync event reporting.
//!
//! This module defines the SyncObserver trait, which decouples the engine
//! from how changes are logged or displayed. The CLI implements it on top of
//! `tracing`; tests implement it to record what was reported.

use crate::model::{CycleReport, FileEntry, SyncOutcome};

/// Trait for receiving events from a sync cycle.
///
/// All methods are called synchronously from the walking thread.
pub trait SyncObserver {
    /// Called before the first file of a cycle.
    fn on_cycle_started(&self, report: &CycleReport);

    /// Called once per source file with its outcome.
    fn on_file_synced(&self, entry: &FileEntry, outcome: &SyncOutcome);

    /// Called after the last file of a cycle.
    fn on_cycle_completed(&self, report: &CycleReport);
}
