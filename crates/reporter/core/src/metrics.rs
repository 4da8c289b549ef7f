//! Metrics about the reporters themselves, recorded through the [`metrics`] facade.

use crate::Operation;

/// Container for reporter lifecycle metrics.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Lifecycle operations by backend, operation and outcome.
    pub const LIFECYCLE_TOTAL: &'static str = "tally_reporter_lifecycle_total";
    /// Number of reporters currently started.
    pub const REPORTERS_RUNNING: &'static str = "tally_reporters_running";

    pub(crate) const OUTCOME_SUCCESS: &'static str = "success";
    pub(crate) const OUTCOME_FAILURE: &'static str = "failure";

    /// Describes and zeroes the lifecycle metrics on the installed recorder.
    pub fn init() {
        Self::describe();
        Self::zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::LIFECYCLE_TOTAL,
            metrics::Unit::Count,
            "Reporter lifecycle operations by backend, operation and outcome"
        );
        metrics::describe_gauge!(
            Self::REPORTERS_RUNNING,
            metrics::Unit::Count,
            "Number of metric reporters currently started"
        );
    }

    fn zero() {
        metrics::gauge!(Self::REPORTERS_RUNNING).set(0.0);
    }

    pub(crate) fn record(backend: &str, operation: Operation, outcome: &'static str) {
        let operation: &'static str = operation.into();
        metrics::counter!(
            Self::LIFECYCLE_TOTAL,
            "backend" => backend.to_string(),
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
    }

    pub(crate) fn running(delta: f64) {
        metrics::gauge!(Self::REPORTERS_RUNNING).increment(delta);
    }
}
