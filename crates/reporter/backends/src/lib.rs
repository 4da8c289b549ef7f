//! Reference reporter backends.
//!
//! - [`PrometheusBackend`] exposes metrics for scraping through a [`prometheus::Registry`],
//!   namespaced under the configured domain; [`ScrapeServer`] answers scrapes over HTTP.
//! - [`ConsoleBackend`] and [`CsvBackend`] push a report on a fixed schedule.
//!
//! [`default_registry`] registers all three under their backend names.

mod error;
pub use error::BackendError;

mod scheduled;
pub use scheduled::{
    Emitter, EmitterFactory, ReportFormat, Schedule, ScheduledBuilder, ScheduledSink,
};

mod console;
pub use console::{ConsoleBackend, ConsoleEmitter, ConsoleOutput, ConsoleReporter};

mod csv;
pub use csv::{CsvBackend, CsvDirectory, CsvEmitter, CsvReporter};

mod exposition;
pub use exposition::{
    PrometheusBackend, PrometheusBuilder, PrometheusReporter, PrometheusSink, render,
};

mod server;
pub use server::ScrapeServer;

use tally_reporter::{ManagedReporter, ReporterRegistry};

/// A registry holding every reference backend.
///
/// The prometheus backend registers with the process-wide default [`::prometheus::Registry`].
pub fn default_registry() -> ReporterRegistry {
    let mut registry = ReporterRegistry::new();
    registry
        .register(PrometheusBackend::NAME, || ManagedReporter::new(PrometheusBackend::new()))
        .register(ConsoleBackend::NAME, || ManagedReporter::new(ConsoleBackend::new()))
        .register(CsvBackend::NAME, || ManagedReporter::new(CsvBackend::new()));
    registry
}
