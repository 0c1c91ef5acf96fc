//! Log output for the server and the ingest command.
//!
//! Events are printed to stdout and appended to a log file through a background writer.
//! `ITGENIE_LOG_FILE` picks the file; without it both binaries append to `logs/itgenie.log`.
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the background writer flushing until the process exits.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_PATH: &str = "logs/itgenie.log";

/// Install the global subscriber.
///
/// `RUST_LOG` controls verbosity (`info` when unset). When the log file cannot be opened only
/// stdout is used. A second call keeps the subscriber installed by the first.
pub fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let installed = match file_writer(log_file) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact(),
            )
            .try_init(),
        None => registry.try_init(),
    };

    if let Err(err) = installed {
        eprintln!("Tracing already initialized: {err}");
    }
}

fn file_writer(log_file: Option<&Path>) -> Option<NonBlocking> {
    let path = resolve_log_path(log_file);
    match open_log_file(&path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!("Logging to stdout only; cannot open {}: {err}", path.display());
            None
        }
    }
}

fn resolve_log_path(log_file: Option<&Path>) -> PathBuf {
    log_file.map_or_else(|| PathBuf::from(DEFAULT_LOG_PATH), Path::to_path_buf)
}

/// Open `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
