//! Push reporters that emit a snapshot on a fixed period.

use crate::BackendError;
use std::{
    fmt::Debug,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};
use tally_reporter::{
    ConfigScope, Metric, MetricSource, ReporterError, ReporterSink, SharedFilter, SharedSource,
    SinkBuilder, TimeUnit, keys,
};
use tokio::{
    runtime::Handle,
    task::{self, JoinHandle},
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Writes one report.
pub trait Emitter: Debug + Send + 'static {
    /// Emits `metrics`, sampled at `timestamp`.
    fn emit(&mut self, timestamp: SystemTime, metrics: &[Metric]) -> io::Result<()>;
}

/// Creates the [`Emitter`] once every option is known.
pub trait EmitterFactory: Debug + Send {
    /// Emitter produced by this factory.
    type Emitter: Emitter;

    /// Creates the emitter. Runs during `prepare`.
    fn create(
        self,
        reporter: &'static str,
        format: ReportFormat,
    ) -> Result<Self::Emitter, ReporterError>;
}

/// How values are rendered by an [`Emitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFormat {
    /// Unit timer durations are expressed in.
    pub durations: TimeUnit,
    /// Unit rates are expressed per.
    pub rates: TimeUnit,
    /// Domain the report is grouped under, if any.
    pub domain: Option<String>,
}

impl Default for ReportFormat {
    fn default() -> Self {
        Self { durations: TimeUnit::Milliseconds, rates: TimeUnit::Seconds, domain: None }
    }
}

/// When a [`ScheduledSink`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between two reports.
    pub period: Duration,
    /// Whether `stop` emits one last report.
    pub report_on_stop: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { period: Self::DEFAULT_PERIOD, report_on_stop: false }
    }
}

impl Schedule {
    /// Period used when none is configured.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

    /// Reads `period`, `period-unit` and `report-on-stop`. A zero period keeps the default.
    pub fn resolve(scope: &ConfigScope<'_>) -> Self {
        let period = scope
            .u64(keys::PERIOD)
            .filter(|amount| *amount > 0)
            .map(|amount| {
                scope.time_unit(keys::PERIOD_UNIT).unwrap_or(TimeUnit::Seconds).as_duration(amount)
            })
            .unwrap_or(Self::DEFAULT_PERIOD);
        let report_on_stop = scope.bool(keys::REPORT_ON_STOP).unwrap_or(false);
        Self { period, report_on_stop }
    }
}

/// [`SinkBuilder`] shared by the scheduled backends.
#[derive(Debug)]
pub struct ScheduledBuilder<F> {
    reporter: &'static str,
    source: SharedSource,
    filter: Option<SharedFilter>,
    schedule: Schedule,
    format: ReportFormat,
    factory: F,
}

impl<F: EmitterFactory> ScheduledBuilder<F> {
    /// Creates a builder with the scheduled defaults.
    pub fn new(
        reporter: &'static str,
        source: SharedSource,
        schedule: Schedule,
        factory: F,
    ) -> Self {
        Self { reporter, source, filter: None, schedule, format: ReportFormat::default(), factory }
    }

    /// Current report format.
    pub const fn format(&self) -> &ReportFormat {
        &self.format
    }
}

impl<F: EmitterFactory> SinkBuilder for ScheduledBuilder<F> {
    type Sink = ScheduledSink<F::Emitter>;

    fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
        self.format.durations = unit;
        self
    }

    fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
        self.format.rates = unit;
        self
    }

    fn in_domain(mut self, domain: String) -> Self {
        self.format.domain = Some(domain);
        self
    }

    fn filter(mut self, filter: SharedFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn build(self) -> Result<Self::Sink, ReporterError> {
        let format = self.format.clone();
        let emitter = self.factory.create(self.reporter, format.clone())?;
        Ok(ScheduledSink {
            reporter: self.reporter,
            source: self.source,
            filter: self.filter,
            schedule: self.schedule,
            format,
            emitter: Arc::new(Mutex::new(emitter)),
            task: None,
        })
    }
}

#[derive(Debug)]
struct ReportTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Reports a filtered snapshot every period from a task on the tokio runtime `start` ran on.
#[derive(Debug)]
pub struct ScheduledSink<E> {
    reporter: &'static str,
    source: SharedSource,
    filter: Option<SharedFilter>,
    schedule: Schedule,
    format: ReportFormat,
    emitter: Arc<Mutex<E>>,
    task: Option<ReportTask>,
}

impl<E: Emitter> ScheduledSink<E> {
    /// The schedule this sink runs on.
    pub const fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// The format reports are rendered in.
    pub const fn format(&self) -> &ReportFormat {
        &self.format
    }

    /// Whether the report task is running.
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Emits one report right away.
    pub fn report_now(&self) {
        report(self.reporter, &*self.source, self.filter.as_ref(), &mut *lock(&self.emitter));
    }
}

impl<E: Emitter> ReporterSink for ScheduledSink<E> {
    fn start(&mut self) -> Result<(), ReporterError> {
        if self.task.is_some() {
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|_| ReporterError::backend(self.reporter, BackendError::NoRuntime))?;
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run(
            self.reporter,
            self.source.clone(),
            self.filter.clone(),
            self.schedule.period,
            self.emitter.clone(),
            cancel.clone(),
        ));
        self.task = Some(ReportTask { cancel, handle });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ReporterError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        task.cancel.cancel();
        // Taking the lock waits out an emit already in progress; the task sees the
        // cancellation before emitting again.
        let mut emitter = lock(&self.emitter);
        task.handle.abort();

        if self.schedule.report_on_stop {
            report(self.reporter, &*self.source, self.filter.as_ref(), &mut *emitter);
        }
        debug!(target: "tally::scheduled", reporter = self.reporter, "Report task stopped");
        Ok(())
    }
}

impl<E> Drop for ScheduledSink<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

async fn run<E: Emitter>(
    reporter: &'static str,
    source: SharedSource,
    filter: Option<SharedFilter>,
    period: Duration,
    emitter: Arc<Mutex<E>>,
    cancel: CancellationToken,
) {
    info!(target: "tally::scheduled", reporter, ?period, "Starting scheduled reports");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let source = source.clone();
                let filter = filter.clone();
                let emitter = emitter.clone();
                let cancel = cancel.clone();
                // Emitters write files and terminals, which blocks.
                let emit = task::spawn_blocking(move || {
                    let mut emitter = lock(&emitter);
                    if !cancel.is_cancelled() {
                        report(reporter, &*source, filter.as_ref(), &mut *emitter);
                    }
                });
                if let Err(err) = emit.await {
                    warn!(target: "tally::scheduled", reporter, %err, "Report task failed");
                }
            }
        }
    }
}

fn report<E: Emitter>(
    reporter: &'static str,
    source: &dyn MetricSource,
    filter: Option<&SharedFilter>,
    emitter: &mut E,
) {
    let metrics = source.filtered_snapshot(filter);
    if let Err(err) = emitter.emit(SystemTime::now(), &metrics) {
        warn!(target: "tally::scheduled", reporter, %err, "Failed to emit report");
    }
}

fn lock<E>(emitter: &Mutex<E>) -> MutexGuard<'_, E> {
    emitter.lock().unwrap_or_else(PoisonError::into_inner)
}
