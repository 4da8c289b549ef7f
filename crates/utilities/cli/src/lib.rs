//! Shared CLI utilities for tally binaries: log flags, tracing bootstrap and the prometheus
//! recorder for the process's own metrics.

mod styles;
pub use styles::cli_styles;

mod flags;
pub use flags::{LogArgs, MetricsArgs};

mod logs;
pub use logs::{FileLogConfig, LogConfig, LogRotation, StdoutLogConfig};

mod tracing;
pub use self::tracing::LogFormat;

mod metrics;
pub use metrics::{MetricsError, init_prometheus_server};
