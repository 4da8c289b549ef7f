//! Translation from untyped configuration mappings into typed reporter options.
//!
//! Everything that reads a raw [`ConfigMap`] lives in this module. Resolution never fails:
//! a key that is absent, blank or cannot be coerced resolves to `None` and the caller keeps
//! its own default.

pub mod keys;

mod unit;
pub use unit::TimeUnit;

mod resolve;
pub use resolve::{
    ConfigMap, ConfigScope, lookup, resolve_bool, resolve_string, resolve_time_unit, resolve_u64,
};

mod options;
pub use options::ReporterOptions;

mod metrics_config;
pub use metrics_config::{MetricsConfig, ReporterEntry};
