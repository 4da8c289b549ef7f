//! Recognised configuration keys.
//!
//! Backend-scoped keys are looked up as-is in the reporter entry. The process-wide fallback
//! for the same option lives under [`PROCESS_PREFIX`], e.g. `metrics.duration-unit`.

/// Prefix applied to option keys when falling back to the process-wide mapping.
pub const PROCESS_PREFIX: &str = "metrics";

/// Process-wide list of reporter entries.
pub const REPORTERS: &str = "metrics.reporters";

/// Names the backend of a reporter entry.
pub const BACKEND_TYPE: &str = "type";

/// Time unit timer durations are converted to.
pub const DURATION_UNIT: &str = "duration-unit";

/// Time unit rates are expressed per.
pub const RATE_UNIT: &str = "rate-unit";

/// Grouping label for reported metrics.
pub const DOMAIN: &str = "domain";

/// Accepted alias of [`DOMAIN`].
pub const NAMESPACE: &str = "namespace";

/// Metric filter definition.
pub const FILTER: &str = "filter";

/// Interval between reports of a scheduled reporter.
pub const PERIOD: &str = "period";

/// Unit of [`PERIOD`].
pub const PERIOD_UNIT: &str = "period-unit";

/// Emit one last report when a scheduled reporter stops.
pub const REPORT_ON_STOP: &str = "report-on-stop";

/// Output directory of the csv backend.
pub const DIRECTORY: &str = "directory";

/// Output stream of the console backend.
pub const OUTPUT: &str = "output";
