//! Tracing subscriber setup.
//!
//! The CLI initializes one of these at startup; library code only emits
//! through `tracing` macros or the injected [`crate::log::Logger`] handle.
//! Filtering honors `RUST_LOG`, falling back to the given default level.
//! Initialization is idempotent: if a global subscriber is already set,
//! the existing one is kept and the call still succeeds.

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive.
///
/// Dropping the guard flushes and closes the log file.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initializes console-only logging.
///
/// # Arguments
///
/// * `default_level` - Filter used when `RUST_LOG` is not set, e.g. "info"
pub fn init_console(default_level: &str) -> LogGuard {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();

    LogGuard { _file_guard: None }
}

/// Initializes logging to both the console and a log file.
///
/// The log directory is created if missing and the file is truncated at
/// session start so each run begins with a clean log.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the file
/// cannot be truncated.
pub fn init_with_file(
    default_level: &str,
    log_dir: &Path,
    log_file: &str,
) -> Result<LogGuard, io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}
