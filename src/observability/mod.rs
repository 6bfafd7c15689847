//! Logging for migration runs.
//!
//! Every run writes to two sinks: a human-readable console stream on stderr
//! and a per-run file `<dir>/migration_<YYYYmmdd_HHMMSS>.log` in the
//! configured format.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Handle for an initialized logging setup.
#[derive(Debug)]
pub struct ObservabilityHandle {
    log_file: PathBuf,
}

impl ObservabilityHandle {
    /// Path of this run's log file.
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes console and file logging for the process.
///
/// # Errors
///
/// Returns an error if logging has already been initialized, the log file
/// cannot be created, or the filter directive is invalid.
pub fn init(settings: &LoggingSettings, verbose: bool) -> Result<ObservabilityHandle> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let directive = filter_directive(
        |key| std::env::var(key).ok(),
        &settings.level,
        verbose,
    );
    let filter = EnvFilter::try_new(&directive).map_err(|e| {
        Error::Configuration(format!("invalid log filter '{directive}': {e}"))
    })?;

    let log_file = log_file_path(&settings.dir, &chrono::Local::now().naive_local());
    let writer = open_log_file(&log_file)?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    match settings.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
    }

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "failed to mark observability initialized".to_string(),
        })?;

    Ok(ObservabilityHandle { log_file })
}

/// Picks the filter directive: env (`TRACKER_MIGRATE_LOG`, then `RUST_LOG`),
/// then `debug` when verbose, then the configured level.
pub fn filter_directive<F>(lookup: F, level: &str, verbose: bool) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ["TRACKER_MIGRATE_LOG", "RUST_LOG"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| {
            if verbose {
                "debug".to_string()
            } else {
                level.to_string()
            }
        })
}

/// Log file for a run started at `started`.
#[must_use]
pub fn log_file_path(dir: &Path, started: &NaiveDateTime) -> PathBuf {
    dir.join(format!("migration_{}.log", started.format("%Y%m%d_%H%M%S")))
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    }
}
