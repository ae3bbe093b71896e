//! Logging setup
//!
//! Events go to a log file that is truncated on every run. If the file cannot
//! be opened, logging falls back to stdout.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file written when `LOG_FILE` is not set
pub const DEFAULT_LOG_FILE: &str = "log.txt";

/// Where log events ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stdout,
}

/// Log file path from `LOG_FILE`, or the default
pub fn log_path() -> PathBuf {
    std::env::var_os("LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Install the global subscriber. `RUST_LOG` filters, `info` otherwise.
pub fn init(path: &Path) -> Result<LogTarget> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match open_truncated(path) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .context("Failed to install log subscriber")?;
            Ok(LogTarget::File(path.to_path_buf()))
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .context("Failed to install log subscriber")?;
            tracing::warn!("Could not open log file, logging to stdout: {:#}", e);
            Ok(LogTarget::Stdout)
        }
    }
}

/// Open the log file for writing, dropping whatever a previous run left
fn open_truncated(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_truncated_clears_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "old content from the last run\n").unwrap();

        let mut file = open_truncated(&path).unwrap();
        writeln!(file, "new").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_open_truncated_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.txt");
        open_truncated(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_truncated_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("log.txt");
        let err = open_truncated(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
