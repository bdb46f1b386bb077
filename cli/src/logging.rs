//! Logging setup.
//!
//! Two sinks: standard output gets everything the filter allows, and an
//! append-only file named after the current day (`autosync_YYYYMMDD.log`)
//! gets INFO and above, except events on [`CONSOLE_TARGET`].

use engine::Clock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, Metadata, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::{self, time::ChronoLocal, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Target for events that must not reach the log file.
pub const CONSOLE_TARGET: &str = "autosync::console";

const LOG_FILE_PREFIX: &str = "autosync_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writer factory that opens the log file for the current day per event.
pub struct DailyLog {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl DailyLog {
    pub fn new(dir: &Path, clock: Arc<dyn Clock>) -> Self {
        DailyLog {
            dir: dir.to_path_buf(),
            clock,
        }
    }

    /// Path of today's log file.
    pub fn current_path(&self) -> PathBuf {
        let day = self.clock.now().format("%Y%m%d");
        self.dir.join(format!("{}{}.log", LOG_FILE_PREFIX, day))
    }
}

/// Handle on the day's log file; writes are dropped if it could not be opened.
pub struct DailyLogFile(Option<File>);

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.0 {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.0 {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DailyLog {
    type Writer = DailyLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())
            .ok();
        DailyLogFile(file)
    }
}

fn is_persistent(metadata: &Metadata<'_>) -> bool {
    metadata.target() != CONSOLE_TARGET && *metadata.level() <= Level::INFO
}

/// The file sink as a layer.
pub fn file_layer<S>(log_dir: &Path, clock: Arc<dyn Clock>) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(DailyLog::new(log_dir, clock))
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(filter_fn(is_persistent))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the console level; otherwise it is `info`, or
/// `debug` with `verbose`.
///
/// # Errors
/// Fails if the log directory cannot be created or a subscriber is
/// already installed.
pub fn init(log_dir: &Path, verbose: bool, clock: Arc<dyn Clock>) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;

    let default_level = if verbose { "debug" } else { "info" };
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer(log_dir, clock))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
