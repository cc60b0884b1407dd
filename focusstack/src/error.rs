//! Error types for the stacking pipeline.

use thiserror::Error;

/// Errors raised by pipeline stages and the scheduler.
///
/// Every error raised inside a task's work function is caught once at the
/// `run()` boundary, converted to a stored message, and the task becomes
/// terminal so that dependents are never left hanging.
#[derive(Debug, Error)]
pub enum StackError {
    /// A file never became readable within its wait window, or could not
    /// be decoded as an image.
    #[error("could not load {0}")]
    LoadFailed(String),

    /// I/O failure while reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image codec rejected the data.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Two buffers that must be combined have incompatible sizes.
    #[error("dimension mismatch: {context}: {expected} vs {actual}")]
    DimensionMismatch {
        /// What was being combined.
        context: String,
        /// Dimensions of the primary buffer, as "WxH".
        expected: String,
        /// Dimensions of the offending buffer, as "WxH".
        actual: String,
    },

    /// A dependency completed without producing the image result the
    /// consumer needs.
    #[error("missing image result from {0}")]
    MissingResult(String),

    /// A task was skipped because one of its dependencies failed.
    #[error("skipped: dependency {0} failed")]
    DependencyFailed(String),

    /// The scheduler shut down while the task was still unrunnable.
    #[error("worker closed before task could run")]
    Shutdown,

    /// The pipeline was invoked without any input images.
    #[error("no input images given")]
    NoInputs,

    /// A scheduled task failed; the message is the first failure the
    /// scheduler observed.
    #[error("{0}")]
    TaskFailed(String),
}

impl StackError {
    /// Creates a dimension-mismatch error from two sizes.
    pub fn dimension_mismatch(
        context: impl Into<String>,
        expected: (u32, u32),
        actual: (u32, u32),
    ) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failed_display() {
        let err = StackError::LoadFailed("input/img01.jpg".to_string());
        assert_eq!(err.to_string(), "could not load input/img01.jpg");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = StackError::dimension_mismatch("alpha mask", (1024, 768), (512, 384));
        assert_eq!(
            err.to_string(),
            "dimension mismatch: alpha mask: 1024x768 vs 512x384"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StackError = io.into();
        assert!(matches!(err, StackError::Io(_)));
    }

    #[test]
    fn test_shutdown_display() {
        assert_eq!(
            StackError::Shutdown.to_string(),
            "worker closed before task could run"
        );
    }

    #[test]
    fn test_dependency_failed_display() {
        let err = StackError::DependencyFailed("load img01".to_string());
        assert_eq!(err.to_string(), "skipped: dependency load img01 failed");
    }
}
