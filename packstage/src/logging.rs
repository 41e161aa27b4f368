//! Logging setup.
//!
//! Installs a `tracing` subscriber with two outputs: a compact stderr layer
//! for the terminal and a non-blocking file layer. `RUST_LOG` overrides the
//! default level.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "packstage.log";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Default log directory: `<data dir>/packstage/logs`, or `./logs`.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("packstage").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber.
///
/// `verbose` lowers the default level from `info` to `debug`. The returned
/// guard flushes the file writer on drop and must be held for the lifetime
/// of the program.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<WorkerGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|e| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::never(log_dir, DEFAULT_LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339())
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(guard)
}

/// Filter used when `RUST_LOG` is unset. The library and the `packstage`
/// binary share the `packstage` target prefix.
fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("packstage={}", level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_log_dir_ends_with_logs() {
        assert!(default_log_dir().ends_with("logs"));
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "packstage=info");
        assert_eq!(default_directive(true), "packstage=debug");
    }

    #[test]
    fn test_create_dir_error_display() {
        let err = LoggingError::CreateDir {
            path: PathBuf::from("/root/logs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/root/logs"));
    }

    #[test]
    fn test_init_creates_log_dir() {
        let temp = TempDir::new().unwrap();
        let log_dir = temp.path().join("nested").join("logs");

        // A second subscriber in the same test binary fails to install; the
        // directory is created either way.
        let _ = init_logging(&log_dir, false);

        assert!(log_dir.is_dir());
    }
}
