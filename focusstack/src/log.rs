//! Logger abstraction injected into tasks.
//!
//! Pipeline stages report diagnostics through a [`Logger`] handle rather
//! than a concrete backend, so the scheduler can hand every task the same
//! sink and tests can swap in a silent or capturing implementation.
//! Production code uses [`TracingLogger`], which forwards to the `tracing`
//! subscriber set up by [`crate::logging`].

use parking_lot::Mutex;
use std::fmt::Arguments;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fine-grained progress detail (per-task diagnostics).
    Verbose,
    /// Normal progress information.
    Info,
    /// Something unexpected, but the pipeline continues.
    Warn,
    /// A stage failed.
    Error,
}

/// Sink for formatted diagnostic strings.
///
/// Implementations must be `Send + Sync`; a single logger instance is
/// shared by every worker thread.
pub trait Logger: Send + Sync {
    /// Records a message at the given level.
    fn log(&self, level: LogLevel, args: Arguments<'_>);

    /// Records a verbose-level message.
    fn verbose(&self, args: Arguments<'_>) {
        self.log(LogLevel::Verbose, args);
    }

    /// Records an info-level message.
    fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    /// Records a warning.
    fn warn(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    /// Records an error.
    fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

/// Logger backed by the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Verbose => tracing::debug!("{}", args),
            LogLevel::Info => tracing::info!("{}", args),
            LogLevel::Warn => tracing::warn!("{}", args),
            LogLevel::Error => tracing::error!("{}", args),
        }
    }
}

/// Logger that discards everything. Used in tests and silent runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}
}

/// Logger that records messages in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct CaptureLogger {
    messages: Mutex<Vec<(LogLevel, String)>>,
}

impl CaptureLogger {
    /// Creates an empty capture logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything logged so far.
    pub fn messages(&self) -> Vec<(LogLevel, String)> {
        self.messages.lock().clone()
    }

    /// Returns true if any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|(_, m)| m.contains(needle))
    }
}

impl Logger for CaptureLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        self.messages.lock().push((level, args.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_loggers_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingLogger>();
        assert_send_sync::<NoOpLogger>();
        assert_send_sync::<CaptureLogger>();
    }

    #[test]
    fn test_capture_logger_records_levels() {
        let logger = CaptureLogger::new();
        logger.verbose(format_args!("loaded {}", "img01"));
        logger.error(format_args!("boom"));

        let messages = logger.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], (LogLevel::Verbose, "loaded img01".to_string()));
        assert_eq!(messages[1], (LogLevel::Error, "boom".to_string()));
        assert!(logger.contains("img01"));
        assert!(!logger.contains("missing"));
    }

    #[test]
    fn test_noop_logger_through_trait_object() {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        logger.info(format_args!("discarded"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Verbose < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
