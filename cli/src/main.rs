//! AutoSync - Command-line driver for the sync engine.
//!
//! Parses arguments, sets up logging, and runs one sync cycle or keeps
//! polling at a fixed cadence.

mod logging;

use clap::Parser;
use engine::{
    Clock, CycleReport, FileEntry, PollSchedule, SkipReason, SyncConfig, SyncObserver,
    SyncOutcome, SystemClock, TreeWalker, DEFAULT_MAX_BACKUPS,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::logging::CONSOLE_TARGET;

/// AutoSync - mirror a directory tree, keeping backups of overwritten files
#[derive(Parser, Debug)]
#[command(name = "autosync")]
#[command(version)]
#[command(about = "Mirror a directory tree into <DEST>/copy, rotating old versions into <DEST>/backup")]
struct Args {
    /// Source directory (-s<path>)
    #[arg(short = 's', value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// Destination directory (-d<path>)
    #[arg(short = 'd', value_name = "DEST")]
    dest: Option<PathBuf>,

    /// Keep running and sync every poll interval
    #[arg(short = 'c')]
    continuous: bool,

    /// Poll interval in minutes for continuous mode
    #[arg(short = 't', value_name = "MINUTES", default_value_t = 60)]
    interval: u64,

    /// Backups kept per file
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_BACKUPS)]
    max_backups: usize,

    /// Directory for the daily log files
    #[arg(long, value_name = "PATH", default_value = ".")]
    log_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Reports sync events through `tracing`.
struct LogObserver;

impl LogObserver {
    fn format_duration(elapsed: chrono::Duration) -> String {
        let millis = elapsed.num_milliseconds().max(0);
        let secs = millis / 1000;
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}.{:03}s", secs, millis % 1000)
        }
    }
}

impl SyncObserver for LogObserver {
    fn on_cycle_started(&self, report: &CycleReport) {
        debug!("Cycle started for {}", report.source_root.display());
    }

    fn on_file_synced(&self, entry: &FileEntry, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created => {
                info!("File created [{}]", entry.source.display());
            }
            SyncOutcome::Updated { backup } => {
                info!(
                    "File updated [{}], previous version kept as {}",
                    entry.source.display(),
                    backup.display()
                );
            }
            SyncOutcome::Skipped(SkipReason::Excluded(exclusion)) => {
                debug!("Skipping {} file [{}]", exclusion, entry.source.display());
            }
            SyncOutcome::Skipped(SkipReason::Unchanged) => {}
            SyncOutcome::Failed(failure) if failure.permission_denied => {
                warn!(target: CONSOLE_TARGET, "Access denied [{}]", failure.source.display());
            }
            SyncOutcome::Failed(failure) => {
                error!(
                    os_error = ?failure.os_error,
                    "Sync failed [{}]: {}",
                    failure.source.display(),
                    failure.message
                );
            }
        }
    }

    fn on_cycle_completed(&self, report: &CycleReport) {
        let elapsed = report
            .elapsed()
            .map(Self::format_duration)
            .unwrap_or_else(|| "?".to_string());
        info!(
            target: CONSOLE_TARGET,
            "Cycle time: {} ({} created, {} updated, {} unchanged, {} excluded, {} failed)",
            elapsed,
            report.created,
            report.updated,
            report.unchanged,
            report.excluded,
            report.failures.len()
        );
    }
}

fn print_usage() {
    println!("No source or destination specified.");
    println!("Please use -s[source] and -d[destination] options.");
    println!("In case of continuous operation shall be performed, please use -c option.");
    println!("Use -t[minutes] to set the poll interval (default 60).");
}

fn main() {
    let args = Args::parse();

    if args.source.is_none() || args.dest.is_none() {
        print_usage();
        return;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    if let Err(e) = logging::init(&args.log_dir, args.verbose, clock.clone()) {
        eprintln!("Logging unavailable: {}", e);
    }

    if let Err(msg) = run_cli(&args, clock) {
        error!("{}", msg);
    }
}

/// Build the sync configuration from the arguments.
fn build_config(args: &Args) -> Result<SyncConfig, String> {
    let (source, dest) = match (&args.source, &args.dest) {
        (Some(source), Some(dest)) => (source, dest),
        _ => return Err("Source and destination are required".to_string()),
    };

    let config = SyncConfig::new(source, dest)
        .with_max_backups(args.max_backups)
        .with_poll_interval(Duration::from_secs(args.interval.saturating_mul(60)));
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, clock: Arc<dyn Clock>) -> Result<(), String> {
    let config = build_config(args)?;
    let interval = config.poll_interval;
    let engine = engine::SyncEngine::new(&config);
    let walker = TreeWalker::with_parts(config, engine, clock.clone());

    info!(
        "Syncing {} into {}",
        walker.config().source.display(),
        walker.config().destination.display()
    );

    if !args.continuous {
        return walker
            .run_cycle(Some(&LogObserver))
            .map(|_| ())
            .map_err(|e| format!("Sync cycle failed: {}", e));
    }

    run_continuous(&walker, clock.as_ref(), interval, None, std::thread::sleep)
}

/// Poll loop. Runs `max_cycles` cycles, or forever if None.
///
/// A failed cycle is logged and retried at the next deadline.
fn run_continuous<F: FnMut(Duration)>(
    walker: &TreeWalker,
    clock: &dyn Clock,
    interval: Duration,
    max_cycles: Option<usize>,
    mut sleep: F,
) -> Result<(), String> {
    let mut schedule =
        PollSchedule::new(clock.now(), interval).map_err(|e| e.to_string())?;
    let mut cycles = 0;

    loop {
        if let Err(e) = walker.run_cycle(Some(&LogObserver)) {
            error!("Sync cycle failed: {}", e);
        }
        cycles += 1;
        if max_cycles.map(|max| cycles >= max).unwrap_or(false) {
            return Ok(());
        }

        debug!("Next cycle at {}", schedule.next_deadline().format("%Y-%m-%d %H:%M:%S"));
        schedule.wait(clock, &mut sleep);
    }
}
