//! Error types for the sync engine.

use serde::Serialize;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Errors are values that end up in the sync report, so they are `Clone`
/// and serializable rather than wrapping foreign error types.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncError {
    /// The instance could not be reached.
    #[error("connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The request did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// The instance answered with an error status.
    #[error("http status {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, usually the appliance's validation message.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// The instance configuration is invalid.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// The run was cancelled or its deadline elapsed.
    #[error("sync cancelled")]
    Cancelled,

    /// A domain synchronizer or replica worker panicked.
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl SyncError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a panic error.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }

    /// Builds a panic error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::panicked(message)
    }

    /// Returns true if a later run may succeed without any change.
    ///
    /// Transport failures, timeouts, server-side errors and rate limiting
    /// are retryable. Validation rejections (4xx) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connection { .. } | SyncError::Timeout => true,
            SyncError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::decode(err.to_string())
        } else if err.is_builder() {
            SyncError::config(err.to_string())
        } else {
            SyncError::connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::connection("connection refused").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::http(502, "bad gateway").is_retryable());
        assert!(SyncError::http(429, "slow down").is_retryable());
        assert!(!SyncError::http(400, "invalid url").is_retryable());
        assert!(!SyncError::decode("eof").is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(SyncError::Cancelled.to_string(), "sync cancelled");
        let err = SyncError::http(400, "filter URL already added");
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("already added"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(SyncError::http(404, "not found")).unwrap();
        assert_eq!(json["kind"], "http");
        assert_eq!(json["status"], 404);

        let json = serde_json::to_value(SyncError::Timeout).unwrap();
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn panic_payloads() {
        let err = SyncError::from_panic(Box::new("boom"));
        assert_eq!(err, SyncError::panicked("boom"));
        let err = SyncError::from_panic(Box::new(String::from("bang")));
        assert_eq!(err, SyncError::panicked("bang"));
        let err = SyncError::from_panic(Box::new(42u8));
        assert!(matches!(err, SyncError::Panicked { .. }));
    }
}
