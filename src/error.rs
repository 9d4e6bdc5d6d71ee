//! Error types for chatkey.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions (e.g. tell an operator typo apart from a dead worker).

use thiserror::Error;

/// Validation errors raised while accepting operator input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Keyword cannot be empty")]
    EmptyKeyword,

    #[error("Keyword has {actual} characters, maximum is {max_length}")]
    KeywordTooLong {
        actual: usize,
        max_length: usize,
    },

    #[error("Keyword '{keyword}' produced an invalid pattern: {reason}")]
    InvalidPattern {
        keyword: String,
        reason: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors raised by the watcher runtime.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Channel '{path}' is disconnected")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Queue '{path}' is full")]
    QueueFull {
        path: String,
    },
}

/// Top-level error type for chatkey.
#[derive(Debug, Error)]
pub enum ChatKeyError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ChatKeyError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for a disconnected channel.
    #[must_use]
    pub fn disconnected(path: &str) -> Self {
        Self::Execution(ExecutionError::Disconnected {
            path: path.to_string(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false, // Same input fails the same way
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Timeout { .. } | ExecutionError::QueueFull { .. }
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for chatkey operations.
pub type ChatKeyResult<T> = Result<T, ChatKeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_empty_keyword() {
        let err = ValidationError::EmptyKeyword;
        assert_eq!(format!("{err}"), "Keyword cannot be empty");
    }

    #[test]
    fn test_validation_error_too_long() {
        let err = ValidationError::KeywordTooLong {
            actual: 300,
            max_length: 256,
        };
        let msg = format!("{err}");
        assert!(msg.contains("300"));
        assert!(msg.contains("256"));
    }

    #[test]
    fn test_execution_error_timeout() {
        let err = ExecutionError::Timeout { duration_ms: 5000 };
        let msg = format!("{err}");
        assert!(msg.contains("5000ms"));
    }

    #[test]
    fn test_error_from_validation() {
        let err: ChatKeyError = ValidationError::EmptyKeyword.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_from_execution() {
        let err: ChatKeyError = ExecutionError::Timeout { duration_ms: 10 }.into();
        assert!(err.is_execution());
        assert!(err.is_retryable());

        let err = ChatKeyError::disconnected("watch_control");
        assert!(err.is_execution());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("watch_control"));
    }

    #[test]
    fn test_queue_full_is_retryable() {
        let err: ChatKeyError = ExecutionError::QueueFull {
            path: "watch_events".to_string(),
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("watch_events"));
    }

    #[test]
    fn test_error_internal() {
        let err = ChatKeyError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
