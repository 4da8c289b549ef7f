//! Builds, starts and tears down the configured reporters.

use crate::{
    ConfigMap, Metrics, MetricsConfig, Operation, Reporter, ReporterError, ReporterRegistry,
    SharedSource,
};
use std::{collections::HashSet, fmt};
use tracing::{error, info, warn};

/// One backend's failure during launch or shutdown.
#[derive(Debug, derive_more::Display)]
#[display("{backend} ({operation}): {error}")]
pub struct BackendFailure {
    /// Backend name as configured.
    pub backend: String,
    /// Lifecycle step that failed.
    pub operation: Operation,
    /// Cause.
    pub error: ReporterError,
}

/// Every backend failure of a launch or shutdown. Never empty.
#[derive(Debug)]
pub struct ReporterFailures(Vec<BackendFailure>);

impl std::error::Error for ReporterFailures {}

impl fmt::Display for ReporterFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} reporter backend(s) failed: ", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl ReporterFailures {
    fn from_vec(failures: Vec<BackendFailure>) -> Option<Self> {
        (!failures.is_empty()).then_some(Self(failures))
    }

    /// The individual failures, in the order they happened.
    pub fn failures(&self) -> &[BackendFailure] {
        &self.0
    }

    /// Names of the failed backends.
    pub fn backends(&self) -> Vec<&str> {
        self.0.iter().map(|failure| failure.backend.as_str()).collect()
    }

    /// Number of failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for symmetry with [`ReporterFailures::len`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the aggregate.
    pub fn into_inner(self) -> Vec<BackendFailure> {
        self.0
    }
}

/// Result of [`ReporterDriver::launch`].
#[derive(Debug)]
pub struct Launch {
    /// Reporters that started.
    pub running: RunningReporters,
    /// Backends that could not be resolved, prepared or started.
    pub failures: Option<ReporterFailures>,
}

/// Drives every configured reporter through its lifecycle, selecting backends from its
/// registry.
#[derive(Debug, derive_more::Constructor)]
pub struct ReporterDriver {
    registry: ReporterRegistry,
}

impl ReporterDriver {
    /// The backend registry.
    pub const fn registry(&self) -> &ReporterRegistry {
        &self.registry
    }

    /// Builds one reporter per configured backend, prepares them all, then starts them all.
    ///
    /// A failing backend never stops the others: its failure is collected and the launch goes
    /// on. A backend that fails to start is stopped again to release its sink.
    pub fn launch(&self, source: SharedSource, process: &ConfigMap) -> Launch {
        let config = MetricsConfig::from_process(process);
        info!(
            target: "tally::driver",
            count = config.reporters.len(),
            "Launching metric reporters"
        );

        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        let mut prepared: Vec<Box<dyn Reporter>> = Vec::with_capacity(config.reporters.len());

        for entry in config.reporters {
            let backend = entry.backend;
            if !seen.insert(backend.clone()) {
                let error = ReporterError::DuplicateBackend(backend.clone());
                failures.push(fail(backend, Operation::Resolve, error));
                continue;
            }

            let Some(mut reporter) = self.registry.create(&backend) else {
                let error = ReporterError::UnknownBackend(backend.clone());
                failures.push(fail(backend, Operation::Resolve, error));
                continue;
            };

            match reporter.prepare(source.clone(), process, &entry.config) {
                Ok(()) => {
                    Metrics::record(&backend, Operation::Prepare, Metrics::OUTCOME_SUCCESS);
                    prepared.push(reporter);
                }
                Err(error) => failures.push(fail(backend, Operation::Prepare, error)),
            }
        }

        let mut running = RunningReporters::default();
        for mut reporter in prepared {
            let backend = reporter.name().to_string();
            match reporter.start() {
                Ok(()) => {
                    info!(target: "tally::driver", %backend, "Reporter started");
                    Metrics::record(&backend, Operation::Start, Metrics::OUTCOME_SUCCESS);
                    Metrics::running(1.0);
                    running.reporters.push(reporter);
                }
                Err(error) => {
                    if let Err(err) = reporter.stop() {
                        warn!(
                            target: "tally::driver",
                            %backend,
                            %err,
                            "Failed to release reporter after failed start"
                        );
                    }
                    failures.push(fail(backend, Operation::Start, error));
                }
            }
        }

        Launch { running, failures: ReporterFailures::from_vec(failures) }
    }
}

fn fail(backend: String, operation: Operation, error: ReporterError) -> BackendFailure {
    error!(target: "tally::driver", %backend, %operation, %error, "Reporter backend failed");
    Metrics::record(&backend, operation, Metrics::OUTCOME_FAILURE);
    BackendFailure { backend, operation, error }
}

/// The started reporters of a process.
///
/// Stops them in reverse start order on [`RunningReporters::shutdown`], or on drop if the
/// process unwinds without an explicit shutdown.
#[derive(Debug, Default)]
pub struct RunningReporters {
    reporters: Vec<Box<dyn Reporter>>,
}

impl RunningReporters {
    /// Number of running reporters.
    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    /// Whether no reporter is running.
    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }

    /// Backend names in start order.
    pub fn names(&self) -> Vec<&str> {
        self.reporters.iter().map(|reporter| reporter.name()).collect()
    }

    /// Stops every reporter in reverse start order, attempting all of them even when some fail.
    pub fn shutdown(mut self) -> Result<(), ReporterFailures> {
        self.stop_all()
    }

    fn stop_all(&mut self) -> Result<(), ReporterFailures> {
        let mut failures = Vec::new();
        while let Some(mut reporter) = self.reporters.pop() {
            let backend = reporter.name().to_string();
            Metrics::running(-1.0);
            match reporter.stop() {
                Ok(()) => {
                    info!(target: "tally::driver", %backend, "Reporter stopped");
                    Metrics::record(&backend, Operation::Stop, Metrics::OUTCOME_SUCCESS);
                }
                Err(error) => failures.push(fail(backend, Operation::Stop, error)),
            }
        }
        ReporterFailures::from_vec(failures).map_or(Ok(()), Err)
    }
}

impl Drop for RunningReporters {
    fn drop(&mut self) {
        if self.reporters.is_empty() {
            return;
        }
        warn!(
            target: "tally::driver",
            count = self.reporters.len(),
            "Reporters dropped without shutdown, stopping them"
        );
        if let Err(failures) = self.stop_all() {
            error!(target: "tally::driver", %failures, "Failed to stop reporters on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReporterPhase, source::NoMetrics};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Reporter double that records its calls and fails where told to.
    #[derive(Debug)]
    struct Scripted {
        name: &'static str,
        fail_on: Option<Operation>,
        phase: ReporterPhase,
        log: Log,
    }

    impl Scripted {
        fn call(&mut self, operation: Operation, next: ReporterPhase) -> Result<(), ReporterError> {
            self.log.lock().unwrap().push(format!("{}:{operation}", self.name));
            if self.fail_on == Some(operation) {
                return Err(ReporterError::backend(self.name, std::io::Error::other("scripted")));
            }
            self.phase = next;
            Ok(())
        }
    }

    impl Reporter for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn phase(&self) -> ReporterPhase {
            self.phase
        }

        fn prepare(
            &mut self,
            _source: SharedSource,
            _process: &ConfigMap,
            _backend: &ConfigMap,
        ) -> Result<(), ReporterError> {
            self.call(Operation::Prepare, ReporterPhase::Prepared)
        }

        fn start(&mut self) -> Result<(), ReporterError> {
            self.call(Operation::Start, ReporterPhase::Started)
        }

        fn stop(&mut self) -> Result<(), ReporterError> {
            self.call(Operation::Stop, ReporterPhase::Stopped)
        }
    }

    fn registry(log: &Log, scripts: &[(&'static str, Option<Operation>)]) -> ReporterRegistry {
        let mut registry = ReporterRegistry::new();
        for &(name, fail_on) in scripts {
            let log = log.clone();
            registry.register(name, move || Scripted {
                name,
                fail_on,
                phase: ReporterPhase::Unprepared,
                log: log.clone(),
            });
        }
        registry
    }

    fn process(reporters: Value) -> ConfigMap {
        match json!({ "metrics": { "reporters": reporters } }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn source() -> SharedSource {
        Arc::new(NoMetrics)
    }

    fn calls(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_nothing_configured() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(&log, &[("console", None)]));

        let launch = driver.launch(source(), &ConfigMap::new());
        assert!(launch.running.is_empty());
        assert!(launch.failures.is_none());
        assert!(calls(&log).is_empty());
    }

    #[test]
    fn test_prepare_failure_does_not_block_other_backend() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(
            &log,
            &[("broken", Some(Operation::Prepare)), ("working", None)],
        ));

        let launch = driver.launch(source(), &process(json!(["broken", "working"])));

        assert_eq!(launch.running.names(), vec!["working"]);
        let failures = launch.failures.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.backends(), vec!["broken"]);
        assert_eq!(failures.failures()[0].operation, Operation::Prepare);
        assert!(failures.to_string().contains("broken (prepare)"));
        assert_eq!(calls(&log), vec!["broken:prepare", "working:prepare", "working:start"]);

        launch.running.shutdown().unwrap();
    }

    #[test]
    fn test_prepares_all_before_starting_any() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(&log, &[("a", None), ("b", None)]));

        let launch = driver.launch(source(), &process(json!(["a", { "type": "B" }])));
        assert_eq!(launch.running.len(), 2);
        assert_eq!(calls(&log), vec!["a:prepare", "b:prepare", "a:start", "b:start"]);

        launch.running.shutdown().unwrap();
        assert_eq!(&calls(&log)[4..], ["b:stop", "a:stop"]);
    }

    #[test]
    fn test_unknown_and_duplicate_backends() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(&log, &[("console", None)]));

        let launch =
            driver.launch(source(), &process(json!(["console", "graphite", "CONSOLE"])));

        assert_eq!(launch.running.names(), vec!["console"]);
        let failures = launch.failures.unwrap().into_inner();
        assert_eq!(failures.len(), 2);
        assert!(matches!(
            &failures[0].error,
            ReporterError::UnknownBackend(name) if name == "graphite"
        ));
        assert!(matches!(
            &failures[1].error,
            ReporterError::DuplicateBackend(name) if name == "console"
        ));
        assert!(failures.iter().all(|failure| failure.operation == Operation::Resolve));

        launch.running.shutdown().unwrap();
    }

    #[test]
    fn test_start_failure_releases_reporter() {
        let log = Log::default();
        let driver =
            ReporterDriver::new(registry(&log, &[("flaky", Some(Operation::Start)), ("ok", None)]));

        let launch = driver.launch(source(), &process(json!(["flaky", "ok"])));

        assert_eq!(launch.running.names(), vec!["ok"]);
        assert_eq!(launch.failures.unwrap().failures()[0].operation, Operation::Start);
        assert_eq!(
            calls(&log),
            vec!["flaky:prepare", "ok:prepare", "flaky:start", "flaky:stop", "ok:start"]
        );
        launch.running.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_continues_past_failures() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(
            &log,
            &[("first", None), ("second", Some(Operation::Stop)), ("third", None)],
        ));

        let launch = driver.launch(source(), &process(json!(["first", "second", "third"])));
        assert!(launch.failures.is_none());

        let failures = launch.running.shutdown().unwrap_err();
        assert_eq!(failures.backends(), vec!["second"]);
        assert_eq!(&calls(&log)[6..], ["third:stop", "second:stop", "first:stop"]);
    }

    #[test]
    fn test_drop_stops_running_reporters() {
        let log = Log::default();
        let driver = ReporterDriver::new(registry(&log, &[("a", None), ("b", None)]));

        let launch = driver.launch(source(), &process(json!(["a", "b"])));
        drop(launch);

        assert_eq!(&calls(&log)[4..], ["b:stop", "a:stop"]);
    }
}
