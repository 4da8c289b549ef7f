//! [`Reporter`](crate::Reporter) errors.

use crate::ReporterPhase;
use thiserror::Error;

/// Boxed error raised by a backend-native sink.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A step of the reporter lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    /// Selecting and constructing the reporter from configuration.
    Resolve,
    /// `prepare`.
    Prepare,
    /// `start`.
    Start,
    /// `stop`.
    Stop,
}

/// Errors raised by a reporter or on its behalf by the driver.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The operation is not allowed in the current phase, e.g. `start` before `prepare`.
    #[error("attempt to {operation} {reporter} reporter while {phase}")]
    InvalidState {
        /// Backend name.
        reporter: String,
        /// Attempted operation.
        operation: Operation,
        /// Phase the reporter was in.
        phase: ReporterPhase,
    },

    /// The backend rejected its configuration while building the sink.
    #[error("{reporter} reporter rejected `{key}`: {reason}")]
    BackendConfig {
        /// Backend name.
        reporter: String,
        /// Offending configuration key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend-native sink failed.
    #[error("{reporter} reporter failed: {source}")]
    Backend {
        /// Backend name.
        reporter: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// No backend is registered under the configured name.
    #[error("no reporter backend named `{0}`")]
    UnknownBackend(String),

    /// The backend is configured more than once.
    #[error("reporter backend `{0}` is configured more than once")]
    DuplicateBackend(String),
}

impl ReporterError {
    /// Wraps a sink error.
    pub fn backend(reporter: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend { reporter: reporter.into(), source: source.into() }
    }

    /// Whether this is an out-of-order lifecycle call.
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = ReporterError::InvalidState {
            reporter: "console".to_string(),
            operation: Operation::Start,
            phase: ReporterPhase::Unprepared,
        };
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "attempt to start console reporter while unprepared");
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::other("disk full");
        let err = ReporterError::backend("csv", io);
        assert!(!err.is_invalid_state());
        assert_eq!(err.to_string(), "csv reporter failed: disk full");
        assert!(std::error::Error::source(&err).is_some());
    }
}
