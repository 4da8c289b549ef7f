//! [`MetricRegistry`] and its metric handles.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tally_reporter::{Distribution, Metric, MetricKind, MetricSource, MetricValue, Rates};
use thiserror::Error;
use tracing::error;

/// Number of most recent values a histogram summarises.
const WINDOW_SIZE: usize = 1028;

/// Errors returned by [`MetricRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already registered as another kind.
    #[error("metric `{name}` is a {found}, not a {expected}")]
    KindMismatch {
        /// Metric name.
        name: String,
        /// Requested kind.
        expected: MetricKind,
        /// Registered kind.
        found: MetricKind,
    },

    /// The registry lock was poisoned by a panicking writer.
    #[error("lock poisoned")]
    LockPoisoned,
}

/// Monotonic counter handle.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Increments by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increments by `n`.
    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge handle holding the last set value.
#[derive(Debug, Clone, Default)]
pub struct Gauge(Arc<AtomicU64>);

impl Gauge {
    /// Sets the value.
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct Window {
    values: VecDeque<f64>,
    count: u64,
}

/// Histogram handle over a sliding window of recent values.
#[derive(Debug, Clone, Default)]
pub struct Histogram(Arc<Mutex<Window>>);

impl Histogram {
    /// Records a value.
    pub fn update(&self, value: f64) {
        let mut window = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if window.values.len() == WINDOW_SIZE {
            window.values.pop_front();
        }
        window.values.push_back(value);
        window.count += 1;
    }

    /// Summary of the current window.
    pub fn distribution(&self) -> Distribution {
        let window = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let (front, back) = window.values.as_slices();
        Distribution::from_window(window.count, &[front, back].concat())
    }
}

#[derive(Debug)]
struct MeterState {
    count: AtomicU64,
    started: Instant,
}

/// Meter handle tracking an event rate.
#[derive(Debug, Clone)]
pub struct Meter(Arc<MeterState>);

impl Default for Meter {
    fn default() -> Self {
        Self(Arc::new(MeterState { count: AtomicU64::new(0), started: Instant::now() }))
    }
}

impl Meter {
    /// Marks one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Marks `n` events.
    pub fn mark_n(&self, n: u64) {
        self.0.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Count and mean rate per second.
    pub fn rates(&self) -> Rates {
        let count = self.0.count.load(Ordering::Relaxed);
        let elapsed = self.0.started.elapsed().as_secs_f64();
        let mean_rate = if elapsed > 0.0 { count as f64 / elapsed } else { 0.0 };
        Rates { count, mean_rate }
    }
}

/// Timer handle: a nanosecond histogram plus a meter.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    durations: Histogram,
    meter: Meter,
}

impl Timer {
    /// Records one timed event.
    pub fn record(&self, elapsed: Duration) {
        self.durations.update(elapsed.as_nanos() as f64);
        self.meter.mark();
    }

    /// Runs `f` and records how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(start.elapsed());
        out
    }

    fn value(&self) -> MetricValue {
        MetricValue::Timer { durations: self.durations.distribution(), rates: self.meter.rates() }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
    Meter(Meter),
    Timer(Timer),
}

impl Entry {
    const fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer(_) => MetricKind::Timer,
        }
    }

    fn value(&self) -> MetricValue {
        match self {
            Self::Counter(c) => MetricValue::Counter(c.get()),
            Self::Gauge(g) => MetricValue::Gauge(g.get()),
            Self::Histogram(h) => MetricValue::Histogram(h.distribution()),
            Self::Meter(m) => MetricValue::Meter(m.rates()),
            Self::Timer(t) => t.value(),
        }
    }
}

/// In-memory [`MetricSource`].
///
/// Clones share the same metrics. Handles are get-or-create: asking twice for the same name
/// returns handles to the same metric.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: Arc<RwLock<BTreeMap<String, Entry>>>,
}

macro_rules! handle {
    ($(#[$doc:meta])* $fn:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $fn(&self, name: &str) -> Result<$ty, RegistryError> {
            let entry = self.get_or_insert(name, || Entry::$variant(<$ty>::default()))?;
            match entry {
                Entry::$variant(handle) => Ok(handle),
                other => Err(RegistryError::KindMismatch {
                    name: name.to_string(),
                    expected: MetricKind::$variant,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl MetricRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    handle!(
        /// Counter named `name`.
        counter, Counter, Counter
    );
    handle!(
        /// Gauge named `name`.
        gauge, Gauge, Gauge
    );
    handle!(
        /// Histogram named `name`.
        histogram, Histogram, Histogram
    );
    handle!(
        /// Meter named `name`.
        meter, Meter, Meter
    );
    handle!(
        /// Timer named `name`.
        timer, Timer, Timer
    );

    /// Removes a metric. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, RegistryError> {
        let mut metrics = self.metrics.write().map_err(|err| {
            error!(target: "tally::registry", %err, "Failed to acquire write lock on metrics");
            RegistryError::LockPoisoned
        })?;
        Ok(metrics.remove(name).is_some())
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no metric is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert(
        &self,
        name: &str,
        make: impl FnOnce() -> Entry,
    ) -> Result<Entry, RegistryError> {
        {
            let metrics = self.metrics.read().map_err(|err| {
                error!(target: "tally::registry", %err, "Failed to acquire read lock on metrics");
                RegistryError::LockPoisoned
            })?;
            if let Some(entry) = metrics.get(name) {
                return Ok(entry.clone());
            }
        }

        let mut metrics = self.metrics.write().map_err(|err| {
            error!(target: "tally::registry", %err, "Failed to acquire write lock on metrics");
            RegistryError::LockPoisoned
        })?;
        Ok(metrics.entry(name.to_string()).or_insert_with(make).clone())
    }
}

impl MetricSource for MetricRegistry {
    fn snapshot(&self) -> Vec<Metric> {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        metrics.iter().map(|(name, entry)| Metric::new(name.clone(), entry.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_share_state() {
        let registry = MetricRegistry::new();
        registry.counter("requests").unwrap().inc();
        registry.counter("requests").unwrap().inc_by(4);
        registry.clone().gauge("load").unwrap().set(0.75);

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot,
            vec![
                Metric::new("load", MetricValue::Gauge(0.75)),
                Metric::new("requests", MetricValue::Counter(5)),
            ]
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = MetricRegistry::new();
        registry.counter("jobs").unwrap();

        let err = registry.timer("jobs").unwrap_err();
        assert_eq!(
            err,
            RegistryError::KindMismatch {
                name: "jobs".to_string(),
                expected: MetricKind::Timer,
                found: MetricKind::Counter,
            }
        );
        assert_eq!(err.to_string(), "metric `jobs` is a counter, not a timer");
    }

    #[test]
    fn test_histogram_window_slides() {
        let histogram = Histogram::default();
        for value in 0..(WINDOW_SIZE + 10) {
            histogram.update(value as f64);
        }

        let dist = histogram.distribution();
        assert_eq!(dist.count, (WINDOW_SIZE + 10) as u64);
        assert_eq!(dist.min, 10.0);
        assert_eq!(dist.max, (WINDOW_SIZE + 9) as f64);
    }

    #[test]
    fn test_timer_records_durations_and_rate() {
        let registry = MetricRegistry::new();
        let timer = registry.timer("db.query").unwrap();
        timer.record(Duration::from_millis(2));
        assert_eq!(timer.time(|| 7), 7);

        match &registry.snapshot()[0].value {
            MetricValue::Timer { durations, rates } => {
                assert_eq!(durations.count, 2);
                assert_eq!(durations.max, 2_000_000.0);
                assert_eq!(rates.count, 2);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_remove() {
        let registry = MetricRegistry::new();
        registry.meter("events").unwrap().mark_n(3);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("events").unwrap());
        assert!(!registry.remove("events").unwrap());
        assert!(registry.is_empty());
    }
}
