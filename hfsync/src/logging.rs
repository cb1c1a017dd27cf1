//! Tracing subscriber setup.
//!
//! Logs go to stderr so they never mix with the status table on stdout.
//! An optional log file receives the same events without ANSI colours.

use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{SyncError, SyncResult};

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Debug level for this crate instead of warnings only.
    pub verbose: bool,
    /// Also write logs to this file.
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            log_file: None,
        }
    }

    /// Write logs to `path` as well as stderr.
    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            "warn,hfsync=debug,hfsync_cli=debug"
        } else {
            "warn"
        }
    }
}

/// Install the global subscriber.
///
/// Returns the guard of the file writer, if any; dropping it flushes and
/// stops the background writer thread, so the caller keeps it until exit.
pub fn init_logging(config: &LoggingConfig) -> SyncResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(config.verbose);

    let (file_layer, guard) = match config.log_file {
        Some(ref path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SyncError::InvalidConfig(format!("failed to initialise logging: {}", e)))?;

    Ok(guard)
}

fn file_writer(
    path: &std::path::Path,
) -> SyncResult<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SyncError::WriteFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SyncError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(tracing_appender::non_blocking(file))
}
