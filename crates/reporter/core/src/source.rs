//! The metric source reporters read from.
//!
//! Reporters only depend on [`MetricSource`]; the process owns the source and shares it with
//! every reporter.

use crate::SharedFilter;
use auto_impl::auto_impl;
use std::{fmt::Debug, sync::Arc};

/// Kinds of metric a source exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MetricKind {
    /// Monotonic count.
    Counter,
    /// Point-in-time value.
    Gauge,
    /// Distribution of values.
    Histogram,
    /// Event rate.
    Meter,
    /// Distribution of durations plus their rate.
    Timer,
}

/// Summary statistics of a distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distribution {
    /// Number of values ever recorded.
    pub count: u64,
    /// Smallest value in the window.
    pub min: f64,
    /// Largest value in the window.
    pub max: f64,
    /// Arithmetic mean of the window.
    pub mean: f64,
    /// Sample standard deviation of the window.
    pub stddev: f64,
    /// Median.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 98th percentile.
    pub p98: f64,
    /// 99th percentile.
    pub p99: f64,
    /// 99.9th percentile.
    pub p999: f64,
}

impl Distribution {
    /// Computes the summary of `window`, `count` being the total number of recorded values.
    pub fn from_window(count: u64, window: &[f64]) -> Self {
        if window.is_empty() {
            return Self { count, ..Default::default() };
        }

        let mut sorted = window.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let stddev = if sorted.len() > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self {
            count,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            stddev,
            p50: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            p95: quantile(&sorted, 0.95),
            p98: quantile(&sorted, 0.98),
            p99: quantile(&sorted, 0.99),
            p999: quantile(&sorted, 0.999),
        }
    }

    /// Applies `f` to every value statistic, keeping the count.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            count: self.count,
            min: f(self.min),
            max: f(self.max),
            mean: f(self.mean),
            stddev: f(self.stddev),
            p50: f(self.p50),
            p75: f(self.p75),
            p95: f(self.p95),
            p98: f(self.p98),
            p99: f(self.p99),
            p999: f(self.p999),
        }
    }

    /// Quantile statistics as `(quantile, value)` pairs.
    pub fn quantiles(&self) -> [(f64, f64); 6] {
        [
            (0.5, self.p50),
            (0.75, self.p75),
            (0.95, self.p95),
            (0.98, self.p98),
            (0.99, self.p99),
            (0.999, self.p999),
        ]
    }
}

/// Interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() as f64 + 1.0);
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= sorted.len() as f64 {
        return sorted[sorted.len() - 1];
    }

    let index = pos as usize;
    let lower = sorted[index - 1];
    let upper = sorted[index];
    lower + (pos - pos.floor()) * (upper - lower)
}

/// Event count and rate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    /// Number of events ever marked.
    pub count: u64,
    /// Mean events per second since creation.
    pub mean_rate: f64,
}

/// Value of a metric at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Counter value.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
    /// Histogram summary.
    Histogram(Distribution),
    /// Meter rates.
    Meter(Rates),
    /// Timer summary; durations are in nanoseconds.
    Timer {
        /// Duration distribution in nanoseconds.
        durations: Distribution,
        /// Rate of timed events.
        rates: Rates,
    },
}

impl MetricValue {
    /// The kind of this value.
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer { .. } => MetricKind::Timer,
        }
    }
}

/// A named metric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Metric name, dot separated by convention.
    pub name: String,
    /// Value at snapshot time.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a metric sample.
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self { name: name.into(), value }
    }

    /// The kind of this metric.
    pub const fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Read-only access to the metrics of a process.
#[auto_impl(&, Arc, Box)]
pub trait MetricSource: Debug + Send + Sync {
    /// Returns the current value of every metric, ordered by name. Never mutates the source.
    fn snapshot(&self) -> Vec<Metric>;

    /// Like [`MetricSource::snapshot`], keeping only metrics that pass `filter`.
    fn filtered_snapshot(&self, filter: Option<&SharedFilter>) -> Vec<Metric> {
        let mut metrics = self.snapshot();
        if let Some(filter) = filter {
            metrics.retain(|metric| filter.matches(&metric.name, metric.kind()));
        }
        metrics
    }
}

/// A metric source shared by every reporter of the process.
pub type SharedSource = Arc<dyn MetricSource>;

/// A source without metrics.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct NoMetrics;

#[cfg(test)]
impl MetricSource for NoMetrics {
    fn snapshot(&self) -> Vec<Metric> {
        Vec::new()
    }
}
