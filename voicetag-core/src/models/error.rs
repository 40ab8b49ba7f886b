use thiserror::Error;

/// Errors raised by the recorder core.
///
/// `Timeout` is recoverable: streaming loops swallow it and retry.
/// Everything else leaves the system in a retriable idle state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("hardware init failed: {0}")]
    HardwareInitFailure(String),

    #[error("i/o failure: {0}")]
    IoFailure(String),

    #[error("unsupported format: {0}")]
    FormatUnsupported(String),

    #[error("already recording")]
    AlreadyRecording,

    #[error("already playing")]
    AlreadyPlaying,

    #[error("timeout")]
    Timeout,

    #[error("device failure: {0}")]
    DeviceFailure(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl RecorderError {
    /// Map an `io::Error` to `IoFailure` with a short context prefix.
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Self::IoFailure(format!("{}: {}", context, err))
    }

    /// Whether a streaming loop should simply retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_context() {
        let err = RecorderError::io(
            "failed to create file",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        );
        assert_eq!(
            err.to_string(),
            "i/o failure: failed to create file: no such directory"
        );
    }

    #[test]
    fn only_timeout_is_retryable() {
        assert!(RecorderError::Timeout.is_retryable());
        assert!(!RecorderError::DeviceFailure("bus fault".into()).is_retryable());
        assert!(!RecorderError::AlreadyRecording.is_retryable());
    }
}
