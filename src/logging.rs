//! Logging setup
//!
//! A log file (`debug.log` by default) at INFO, or at DEBUG with the output
//! mirrored to stderr when `--debug` is given.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// Logging state for the life of the process
pub struct LogSession {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

pub fn level_for(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

pub fn setup_logging(debug: bool, log_path: &Path) -> Result<LogSession> {
    let level = level_for(debug);

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {:?}", parent))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let writer = if debug {
        BoxMakeWriter::new(non_blocking.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(non_blocking)
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::info!("cloud-asset-count started with log level: {}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(LogSession {
        path: log_path.to_path_buf(),
        _guard: guard,
    })
}
