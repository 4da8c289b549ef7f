use thiserror::Error;

/// Failures of a backend-native sink.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Writing a report failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The prometheus registry rejected the collector.
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    /// Scheduled sinks need a tokio runtime to run on.
    #[error("no tokio runtime to schedule reports on")]
    NoRuntime,
}
