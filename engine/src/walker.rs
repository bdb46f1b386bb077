//! Tree traversal.
//!
//! `TreeWalker` walks the source tree depth-first, mapping every file into the
//! copy tree and the backup tree under the same relative path, and hands each
//! file to the `SyncEngine`. A failing file is recorded and skipped; a
//! directory that cannot be listed ends the cycle.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::{CycleReport, FileEntry};
use crate::observer::SyncObserver;
use crate::sync::SyncEngine;

/// Runs sync cycles over a configured source tree.
pub struct TreeWalker {
    config: SyncConfig,
    engine: SyncEngine,
    clock: Arc<dyn Clock>,
}

impl TreeWalker {
    /// Walker over the real filesystem and wall clock.
    pub fn new(config: SyncConfig) -> Self {
        let engine = SyncEngine::new(&config);
        Self::with_parts(config, engine, Arc::new(SystemClock))
    }

    pub fn with_parts(config: SyncConfig, engine: SyncEngine, clock: Arc<dyn Clock>) -> Self {
        TreeWalker {
            config,
            engine,
            clock,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one cycle over the configured roots.
    ///
    /// # Errors
    /// Returns `SyncError::SourceNotFound` if the source root is missing, or
    /// any directory-level error from [`TreeWalker::walk`].
    pub fn run_cycle(&self, observer: Option<&dyn SyncObserver>) -> Result<CycleReport, SyncError> {
        if !self.config.source.exists() {
            return Err(SyncError::SourceNotFound {
                path: self.config.source.clone(),
            });
        }
        self.walk(
            &self.config.source,
            &self.config.copy_root(),
            &self.config.backup_root(),
            observer,
        )
    }

    /// Synchronize everything under `source_dir` into `copy_dir`, rotating
    /// overwritten files into `backup_dir`.
    ///
    /// Files of a directory are handled before its subdirectories. Per-file
    /// failures are collected in the report.
    ///
    /// # Errors
    /// Returns `SyncError::EnumerationFailed` if any directory of the source
    /// tree cannot be listed.
    pub fn walk(
        &self,
        source_dir: &Path,
        copy_dir: &Path,
        backup_dir: &Path,
        observer: Option<&dyn SyncObserver>,
    ) -> Result<CycleReport, SyncError> {
        let mut report = CycleReport::new(source_dir, self.clock.now());
        if let Some(observer) = observer {
            observer.on_cycle_started(&report);
        }

        self.walk_dir(source_dir, copy_dir, backup_dir, observer, &mut report)?;

        report.finished_at = Some(self.clock.now());
        if let Some(observer) = observer {
            observer.on_cycle_completed(&report);
        }
        Ok(report)
    }

    fn walk_dir(
        &self,
        source_dir: &Path,
        copy_dir: &Path,
        backup_dir: &Path,
        observer: Option<&dyn SyncObserver>,
        report: &mut CycleReport,
    ) -> Result<(), SyncError> {
        let (files, dirs) = list_dir(source_dir)?;
        debug!(
            dir = %source_dir.display(),
            files = files.len(),
            dirs = dirs.len(),
            "walking directory"
        );

        for name in &files {
            let entry = FileEntry::new(Path::new(name), source_dir, copy_dir, backup_dir);
            let outcome = self.engine.sync(&entry);
            report.record(&outcome);
            if let Some(observer) = observer {
                observer.on_file_synced(&entry, &outcome);
            }
        }

        for name in &dirs {
            self.walk_dir(
                &source_dir.join(name),
                &copy_dir.join(name),
                &backup_dir.join(name),
                observer,
                report,
            )?;
        }

        Ok(())
    }
}

/// Split a directory into (file names, subdirectory names), each sorted.
///
/// Symlinks to files are mirrored as files. Symlinks to directories are
/// never descended into, so a link back to an ancestor cannot loop. A
/// dangling link counts as a file so the failure surfaces per file.
fn list_dir(dir: &Path) -> Result<(Vec<OsString>, Vec<OsString>), SyncError> {
    let entries = fs::read_dir(dir).map_err(|e| SyncError::EnumerationFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::EnumerationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| SyncError::EnumerationFailed {
            path: entry.path(),
            source: e,
        })?;

        if file_type.is_dir() {
            dirs.push(entry.file_name());
        } else if file_type.is_symlink() {
            let target_is_dir = fs::metadata(entry.path())
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if target_is_dir {
                debug!(link = %entry.path().display(), "not following directory symlink");
            } else {
                files.push(entry.file_name());
            }
        } else {
            files.push(entry.file_name());
        }
    }

    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{FileAttributeSource, FileAttributes, OsAttributes};
    use crate::clock::FixedClock;
    use crate::model::{Exclusion, SkipReason, SyncOutcome};
    use chrono::{DateTime, Local, TimeZone};
    use filetime::FileTime;
    use std::cell::RefCell;
    use std::io;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Tree {
        _temp: TempDir,
        config: SyncConfig,
    }

    impl Tree {
        fn new() -> Self {
            let temp = tempfile::tempdir().expect("Failed to create temp dir");
            let src = temp.path().join("src");
            fs::create_dir(&src).expect("Failed to create src dir");
            let config = SyncConfig::new(&src, temp.path().join("dst"));
            Tree {
                _temp: temp,
                config,
            }
        }

        fn src(&self, rel: &str) -> PathBuf {
            self.config.source.join(rel)
        }

        fn copy(&self, rel: &str) -> PathBuf {
            self.config.copy_root().join(rel)
        }

        fn write(&self, rel: &str, content: &str, mtime: SystemTime) {
            let path = self.src(rel);
            fs::create_dir_all(path.parent().unwrap()).expect("Failed to create dirs");
            fs::write(&path, content).expect("Failed to write file");
            filetime::set_file_mtime(&path, FileTime::from_system_time(mtime))
                .expect("Failed to set mtime");
        }

        fn backups(&self, rel: &str) -> Vec<String> {
            let dir = self.config.backup_root().join(rel);
            let dir = dir.parent().unwrap();
            let mut names: Vec<String> = match fs::read_dir(dir) {
                Ok(entries) => entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect(),
                Err(_) => Vec::new(),
            };
            names.sort();
            names
        }
    }

    fn at(secs_after_base: u64) -> SystemTime {
        let base: SystemTime = Local
            .with_ymd_and_hms(2026, 4, 1, 10, 0, 0)
            .earliest()
            .expect("valid local time")
            .into();
        base + Duration::from_secs(secs_after_base)
    }

    fn stamp(t: SystemTime) -> String {
        DateTime::<Local>::from(t).format("%y%m%d%H%M%S").to_string()
    }

    fn mtime(path: &Path) -> FileTime {
        FileTime::from_last_modification_time(&fs::metadata(path).expect("Failed to stat"))
    }

    #[derive(Default)]
    struct Recorder {
        started: RefCell<usize>,
        completed: RefCell<usize>,
        files: RefCell<Vec<(PathBuf, SyncOutcome)>>,
    }

    impl SyncObserver for Recorder {
        fn on_cycle_started(&self, _report: &CycleReport) {
            *self.started.borrow_mut() += 1;
        }

        fn on_file_synced(&self, entry: &FileEntry, outcome: &SyncOutcome) {
            self.files
                .borrow_mut()
                .push((entry.source.clone(), outcome.clone()));
        }

        fn on_cycle_completed(&self, _report: &CycleReport) {
            *self.completed.borrow_mut() += 1;
        }
    }

    /// Denies access to "locked.txt" and marks names starting with "hidden".
    struct FaultyAttributes;

    impl FileAttributeSource for FaultyAttributes {
        fn attributes(&self, path: &Path) -> io::Result<FileAttributes> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name == "locked.txt" {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            let mut attrs = OsAttributes.attributes(path)?;
            attrs.hidden = name.starts_with("hidden");
            Ok(attrs)
        }
    }

    fn faulty_walker(config: &SyncConfig) -> TreeWalker {
        let engine = SyncEngine::with_attributes(config, Box::new(FaultyAttributes));
        TreeWalker::with_parts(config.clone(), engine, Arc::new(SystemClock))
    }

    #[test]
    fn test_cycle_mirrors_nested_tree() {
        let tree = Tree::new();
        tree.write("a.txt", "a", at(0));
        tree.write("sub/b.txt", "b", at(10));
        tree.write("sub/deep/c.txt", "c", at(20));

        let report = TreeWalker::new(tree.config.clone())
            .run_cycle(None)
            .expect("Cycle failed");

        assert_eq!(report.created, 3);
        assert!(report.failures.is_empty());
        assert_eq!(fs::read_to_string(tree.copy("sub/deep/c.txt")).unwrap(), "c");
        assert_eq!(mtime(&tree.copy("sub/b.txt")), FileTime::from_system_time(at(10)));
        assert!(!tree.config.backup_root().exists());
    }

    #[test]
    fn test_second_cycle_is_idempotent() {
        let tree = Tree::new();
        tree.write("a.txt", "a", at(0));
        tree.write("sub/b.txt", "b", at(10));
        let walker = TreeWalker::new(tree.config.clone());

        walker.run_cycle(None).expect("First cycle failed");
        let report = walker.run_cycle(None).expect("Second cycle failed");

        assert_eq!(report.changes(), 0);
        assert_eq!(report.unchanged, 2);
        assert!(report.backups.is_empty());
        assert!(!tree.config.backup_root().exists());
    }

    #[test]
    fn test_update_rotates_previous_copy() {
        let tree = Tree::new();
        let walker = TreeWalker::new(tree.config.clone());

        tree.write("a.txt", "v1", at(0));
        walker.run_cycle(None).expect("Cycle 1 failed");
        assert!(tree.backups("a.txt").is_empty());

        tree.write("a.txt", "v2", at(60));
        let report = walker.run_cycle(None).expect("Cycle 2 failed");

        assert_eq!(report.updated, 1);
        assert_eq!(fs::read_to_string(tree.copy("a.txt")).unwrap(), "v2");
        assert_eq!(mtime(&tree.copy("a.txt")), FileTime::from_system_time(at(60)));
        assert_eq!(tree.backups("a.txt"), vec![format!("a.txt.bak_{}", stamp(at(0)))]);
    }

    #[test]
    fn test_retention_keeps_most_recent_backups() {
        let tree = Tree::new();
        let walker = TreeWalker::new(tree.config.clone());

        tree.write("sub/a.txt", "v0", at(0));
        walker.run_cycle(None).expect("Initial cycle failed");

        for i in 1..=6u64 {
            tree.write("sub/a.txt", &format!("v{}", i), at(i * 60));
            walker.run_cycle(None).expect("Update cycle failed");
            assert!(tree.backups("sub/a.txt").len() <= 5);
        }

        // Six updates backed up v0..v5; v0 was evicted by the sixth
        let expected: Vec<String> = (1..=5u64)
            .map(|i| format!("a.txt.bak_{}", stamp(at(i * 60))))
            .collect();
        assert_eq!(tree.backups("sub/a.txt"), expected);
        assert_eq!(fs::read_to_string(tree.copy("sub/a.txt")).unwrap(), "v6");
    }

    #[test]
    fn test_failing_file_does_not_stop_the_walk() {
        let tree = Tree::new();
        tree.write("a.txt", "a", at(0));
        tree.write("locked.txt", "secret", at(0));
        tree.write("sub/z.txt", "z", at(0));

        let report = faulty_walker(&tree.config)
            .run_cycle(None)
            .expect("Cycle failed");

        assert_eq!(report.created, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].permission_denied);
        assert_eq!(report.failures[0].source, tree.src("locked.txt"));
        assert!(tree.copy("a.txt").exists());
        assert!(tree.copy("sub/z.txt").exists());
        assert!(!tree.copy("locked.txt").exists());
    }

    #[test]
    fn test_hidden_files_are_never_reported_as_changes() {
        let tree = Tree::new();
        tree.write("hidden.txt", "h", at(0));
        tree.write("shown.txt", "s", at(0));
        let walker = faulty_walker(&tree.config);
        let recorder = Recorder::default();

        let report = walker.run_cycle(Some(&recorder)).expect("Cycle failed");

        assert_eq!(report.excluded, 1);
        assert_eq!(report.created, 1);
        assert!(!tree.copy("hidden.txt").exists());
        let files = recorder.files.borrow();
        let hidden = files
            .iter()
            .find(|(path, _)| path.ends_with("hidden.txt"))
            .expect("Hidden file should still be visited");
        assert_eq!(
            hidden.1,
            SyncOutcome::Skipped(SkipReason::Excluded(Exclusion::Hidden))
        );
    }

    #[test]
    fn test_observer_sees_every_file_once() {
        let tree = Tree::new();
        tree.write("a.txt", "a", at(0));
        tree.write("sub/b.txt", "b", at(0));
        let recorder = Recorder::default();

        TreeWalker::new(tree.config.clone())
            .run_cycle(Some(&recorder))
            .expect("Cycle failed");

        assert_eq!(*recorder.started.borrow(), 1);
        assert_eq!(*recorder.completed.borrow(), 1);
        let files = recorder.files.borrow();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|(_, outcome)| *outcome == SyncOutcome::Created));
        // Files of a directory come before its subdirectories
        assert_eq!(files[0].0, tree.src("a.txt"));
    }

    #[test]
    fn test_report_uses_injected_clock() {
        let tree = Tree::new();
        let start = Local.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).earliest().unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let engine = SyncEngine::new(&tree.config);
        let walker = TreeWalker::with_parts(tree.config.clone(), engine, clock);

        let report = walker.run_cycle(None).expect("Cycle failed");

        assert_eq!(report.started_at, start);
        assert_eq!(report.elapsed(), Some(chrono::Duration::zero()));
    }

    #[test]
    fn test_missing_source_root_fails_the_cycle() {
        let tree = Tree::new();
        fs::remove_dir(&tree.config.source).expect("Failed to remove src");

        let result = TreeWalker::new(tree.config.clone()).run_cycle(None);
        assert!(matches!(result, Err(SyncError::SourceNotFound { .. })));
    }

    #[test]
    fn test_unlistable_directory_propagates() {
        let tree = Tree::new();
        let walker = TreeWalker::new(tree.config.clone());

        let result = walker.walk(
            &tree.src("does-not-exist"),
            &tree.copy("x"),
            &tree.config.backup_root(),
            None,
        );
        assert!(matches!(result, Err(SyncError::EnumerationFailed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlink_loop_is_not_followed() {
        let tree = Tree::new();
        tree.write("a.txt", "a", at(0));
        tree.write("sub/b.txt", "b", at(0));
        std::os::unix::fs::symlink(&tree.config.source, tree.src("loop"))
            .expect("Failed to create symlink");
        std::os::unix::fs::symlink(tree.src("a.txt"), tree.src("link.txt"))
            .expect("Failed to create symlink");

        let report = TreeWalker::new(tree.config.clone())
            .run_cycle(None)
            .expect("Cycle failed");

        assert!(report.failures.is_empty());
        assert_eq!(report.created, 3);
        assert!(!tree.copy("loop").exists());
        assert_eq!(fs::read_to_string(tree.copy("link.txt")).unwrap(), "a");
        assert!(tree.copy("sub/b.txt").exists());
    }
}
