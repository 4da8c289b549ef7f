//! Reporter lifecycle and configuration resolution.
//!
//! This crate defines how metric reporter backends are uniformly configured,
//! activated and torn down. It does not talk to any monitoring system itself:
//! each backend hands a resolved configuration to its own sink.
//!
//! ## Flow
//!
//! - An untyped [`ConfigMap`] is translated once into typed [`ReporterOptions`] through a
//!   [`ConfigScope`], reading the backend-scoped mapping before the process-wide one.
//! - A [`Reporter`] moves through `prepare → start → stop`. [`ManagedReporter`] enforces the
//!   transitions for every [`ReporterBackend`].
//! - The [`ReporterDriver`] builds one reporter per configured backend from a
//!   [`ReporterRegistry`], starts them and hands back a [`RunningReporters`] guard that stops
//!   them in reverse order.

pub mod config;
pub use config::{
    ConfigMap, ConfigScope, MetricsConfig, ReporterEntry, ReporterOptions, TimeUnit, keys,
};

mod filter;
pub use filter::{GlobFilter, MetricFilter, SharedFilter, resolve_filter};

pub mod source;
pub use source::{
    Distribution, Metric, MetricKind, MetricSource, MetricValue, Rates, SharedSource,
};

mod reporter;
pub use reporter::{
    ManagedReporter, Operation, Reporter, ReporterBackend, ReporterError, ReporterPhase,
    ReporterSink, SinkBuilder,
};

mod registry;
pub use registry::ReporterRegistry;

mod driver;
pub use driver::{BackendFailure, Launch, ReporterDriver, ReporterFailures, RunningReporters};

mod metrics;
pub use metrics::Metrics;
