// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Logging setup
//!
//! Console output is quiet by default (errors only). `--verbose` shows info
//! and `--debug` shows debug with targets. When `[cli.logs] save_logs` is on,
//! a second layer appends plain text to `snowcli.log` at the configured level.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{is_default_logs_path, LogsConfig};

/// Log file name inside the logs directory
pub const LOG_FILENAME: &str = "snowcli.log";

/// Values accepted by `[cli.logs] level`
pub const LOG_LEVELS: [&str; 5] = ["debug", "info", "warning", "error", "critical"];

/// Logging setup failure
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `--verbose` and `--debug` together
    #[error("Only one parameter `verbose` or `debug` is possible")]
    ConflictingFlags,

    /// Unknown `[cli.logs] level`
    #[error("Invalid 'level' value set in [logs] section: {0}. 'level' should be one of: {}", LOG_LEVELS.join(" / "))]
    InvalidLogsConfiguration(String),

    /// Configured logs directory is missing
    #[error("Directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// Log file cannot be created
    #[error("Cannot open log file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A global subscriber is already installed
    #[error("Logging is already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Console level from the global flags
pub fn console_level(verbose: bool, debug: bool) -> Result<LevelFilter, LoggingError> {
    match (verbose, debug) {
        (true, true) => Err(LoggingError::ConflictingFlags),
        (true, false) => Ok(LevelFilter::INFO),
        (false, true) => Ok(LevelFilter::DEBUG),
        (false, false) => Ok(LevelFilter::ERROR),
    }
}

/// Level filter for a `[cli.logs] level` value
pub fn file_level(name: &str) -> Result<LevelFilter, LoggingError> {
    match name.to_ascii_lowercase().as_str() {
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warning" => Ok(LevelFilter::WARN),
        "error" | "critical" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLogsConfiguration(name.to_string())),
    }
}

/// Log file path, creating the directory only when it is the default one
pub fn prepare_log_file(directory: &Path) -> Result<PathBuf, LoggingError> {
    if !directory.is_dir() {
        if !is_default_logs_path(directory) {
            return Err(LoggingError::MissingDirectory(directory.to_path_buf()));
        }
        fs::create_dir_all(directory).map_err(|source| LoggingError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
    }
    Ok(directory.join(LOG_FILENAME))
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Install the global subscriber
pub fn init(verbose: bool, debug: bool, logs: &LogsConfig) -> Result<(), LoggingError> {
    let console = console_level(verbose, debug)?;
    let file = if debug {
        LevelFilter::DEBUG
    } else {
        file_level(&logs.level)?
    };

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(debug)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(console.into())
                .from_env_lossy(),
        );

    let file_layer = if logs.save_logs {
        let path = prepare_log_file(&logs.directory())?;
        let writer = Mutex::new(open_log_file(&path)?);
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_console_level_from_flags() {
        assert_eq!(console_level(false, false).unwrap(), LevelFilter::ERROR);
        assert_eq!(console_level(true, false).unwrap(), LevelFilter::INFO);
        assert_eq!(console_level(false, true).unwrap(), LevelFilter::DEBUG);
        assert!(matches!(
            console_level(true, true),
            Err(LoggingError::ConflictingFlags)
        ));
    }

    #[test]
    fn test_file_level_validation() {
        assert_eq!(file_level("warning").unwrap(), LevelFilter::WARN);
        assert_eq!(file_level("CRITICAL").unwrap(), LevelFilter::ERROR);

        let err = file_level("verbose").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLogsConfiguration(_)));
        assert!(err.to_string().contains("debug / info / warning / error / critical"));
    }

    #[test]
    fn test_custom_directory_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");

        let err = prepare_log_file(&missing).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!missing.exists());

        assert_eq!(
            prepare_log_file(dir.path()).unwrap(),
            dir.path().join(LOG_FILENAME)
        );
    }
}
