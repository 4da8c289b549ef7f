//! Flags shared by tally binaries.

mod log;
pub use log::LogArgs;

mod metrics;
pub use metrics::MetricsArgs;
