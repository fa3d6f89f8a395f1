//! Tracing subscriber setup.
//!
//! Events go to a log file, truncated when a session starts, and to
//! stdout. Verbosity follows `RUST_LOG` and defaults to `info`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Flushes the log file when dropped; keep it alive while logging.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the log file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Creates `log_dir` if needed and empties `log_file` inside it.
pub fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}

/// Installs the global subscriber.
///
/// Fails if the log file cannot be prepared. Must be called at most once
/// per process.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let path = prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

pub fn default_log_dir() -> &'static str {
    crate::config::defaults::DEFAULT_LOG_DIRECTORY
}

pub fn default_log_file() -> &'static str {
    crate::config::defaults::DEFAULT_LOG_FILE
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_dir(), "logs");
        assert_eq!(default_log_file(), "tilesmith.log");
    }

    // init_logging installs a global subscriber, so only the file handling
    // is exercised here.
    #[test]
    fn test_prepare_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join("b");

        let path = prepare_log_file(&dir, "run.log").unwrap();

        assert_eq!(path, dir.join("run.log"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_truncates_previous_session() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("run.log"), "old session").unwrap();

        let path = prepare_log_file(temp.path(), "run.log").unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }
}
