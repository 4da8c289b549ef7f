//! Traits a backend implements to take part in the reporter lifecycle.

use crate::{ConfigMap, ConfigScope, ReporterError, SharedFilter, SharedSource, TimeUnit};
use auto_impl::auto_impl;
use std::fmt::Debug;

/// Lifecycle phase of a reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReporterPhase {
    /// Constructed, no sink yet.
    Unprepared,
    /// Sink built, not active.
    Prepared,
    /// Sink active.
    Started,
    /// Sink released. Terminal.
    Stopped,
}

/// A backend adapter exposing metrics to an external sink.
///
/// Lifecycle calls are made from a single coordinating thread, though `stop` may come from a
/// different thread than `start` (hence `Send`).
#[auto_impl(&mut, Box)]
pub trait Reporter: Debug + Send {
    /// Backend name.
    fn name(&self) -> &str;

    /// Current lifecycle phase.
    fn phase(&self) -> ReporterPhase;

    /// Resolves options from the two mappings and builds the backend-native sink.
    ///
    /// Only valid once, on an unprepared reporter.
    fn prepare(
        &mut self,
        source: SharedSource,
        process: &ConfigMap,
        backend: &ConfigMap,
    ) -> Result<(), ReporterError>;

    /// Activates the sink. Fails with [`ReporterError::InvalidState`] unless prepared.
    fn start(&mut self) -> Result<(), ReporterError>;

    /// Deactivates and releases the sink. Fails with [`ReporterError::InvalidState`] if the
    /// reporter was never prepared.
    fn stop(&mut self) -> Result<(), ReporterError>;
}

/// Backend-native sink: the thing that actually exposes metrics.
pub trait ReporterSink: Debug + Send {
    /// Begins reporting.
    fn start(&mut self) -> Result<(), ReporterError>;

    /// Stops reporting. No report is observable once this returns.
    fn stop(&mut self) -> Result<(), ReporterError>;
}

/// Backend-native builder for a [`ReporterSink`].
///
/// Setters default to ignoring the option, for backends where it does not apply.
pub trait SinkBuilder: Sized {
    /// Sink produced by [`SinkBuilder::build`].
    type Sink: ReporterSink;

    /// Converts timer durations to `unit`.
    fn convert_durations_to(self, _unit: TimeUnit) -> Self {
        self
    }

    /// Expresses rates per `unit`.
    fn convert_rates_to(self, _unit: TimeUnit) -> Self {
        self
    }

    /// Groups reported metrics under `domain`.
    fn in_domain(self, _domain: String) -> Self {
        self
    }

    /// Only reports metrics passing `filter`.
    fn filter(self, _filter: SharedFilter) -> Self {
        self
    }

    /// Builds the sink.
    fn build(self) -> Result<Self::Sink, ReporterError>;
}

/// A backend type: produces a builder from the metric source and backend-specific settings.
pub trait ReporterBackend: Debug + Send {
    /// Builder this backend uses.
    type Builder: SinkBuilder;

    /// Registry name of the backend.
    fn name(&self) -> &'static str;

    /// Creates a builder for `source`. Backend-specific keys (not the cross-backend options)
    /// are read from `scope` here.
    fn builder(
        &self,
        source: SharedSource,
        scope: &ConfigScope<'_>,
    ) -> Result<Self::Builder, ReporterError>;
}
