//! [`ManagedReporter`]: the one state machine every backend runs through.

use crate::{
    ConfigMap, ConfigScope, Operation, Reporter, ReporterBackend, ReporterError, ReporterOptions,
    ReporterPhase, ReporterSink, SharedSource, SinkBuilder,
};
use tracing::{debug, info, warn};

type SinkOf<B> = <<B as ReporterBackend>::Builder as SinkBuilder>::Sink;

/// Drives a [`ReporterBackend`] through `prepare → start → stop`.
///
/// The sink exists exactly while the reporter is prepared or started.
#[derive(Debug)]
pub struct ManagedReporter<B: ReporterBackend> {
    backend: B,
    phase: ReporterPhase,
    sink: Option<SinkOf<B>>,
}

impl<B: ReporterBackend> ManagedReporter<B> {
    /// Wraps `backend` in an unprepared reporter.
    pub const fn new(backend: B) -> Self {
        Self { backend, phase: ReporterPhase::Unprepared, sink: None }
    }

    /// The wrapped backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The sink, while prepared or started.
    pub const fn sink(&self) -> Option<&SinkOf<B>> {
        self.sink.as_ref()
    }

    fn invalid(&self, operation: Operation) -> ReporterError {
        ReporterError::InvalidState {
            reporter: self.backend.name().to_string(),
            operation,
            phase: self.phase,
        }
    }
}

impl<B: ReporterBackend> Reporter for ManagedReporter<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn phase(&self) -> ReporterPhase {
        self.phase
    }

    fn prepare(
        &mut self,
        source: SharedSource,
        process: &ConfigMap,
        backend: &ConfigMap,
    ) -> Result<(), ReporterError> {
        if self.phase != ReporterPhase::Unprepared {
            return Err(self.invalid(Operation::Prepare));
        }

        info!(target: "tally::reporter", reporter = self.name(), "Preparing...");
        let scope = ConfigScope::new(process, backend);
        let options = ReporterOptions::resolve(&scope);
        let builder = options.apply(self.backend.builder(source, &scope)?);

        self.sink = Some(builder.build()?);
        self.phase = ReporterPhase::Prepared;
        Ok(())
    }

    fn start(&mut self) -> Result<(), ReporterError> {
        match self.phase {
            ReporterPhase::Started => {
                debug!(target: "tally::reporter", reporter = self.name(), "Already started");
                Ok(())
            }
            ReporterPhase::Prepared => {
                debug!(target: "tally::reporter", reporter = self.name(), "Starting...");
                let sink = self.sink.as_mut().ok_or_else(|| ReporterError::InvalidState {
                    reporter: self.backend.name().to_string(),
                    operation: Operation::Start,
                    phase: self.phase,
                })?;
                sink.start()?;
                self.phase = ReporterPhase::Started;
                Ok(())
            }
            ReporterPhase::Unprepared | ReporterPhase::Stopped => {
                Err(self.invalid(Operation::Start))
            }
        }
    }

    fn stop(&mut self) -> Result<(), ReporterError> {
        match self.phase {
            ReporterPhase::Unprepared => Err(self.invalid(Operation::Stop)),
            ReporterPhase::Stopped => {
                debug!(target: "tally::reporter", reporter = self.name(), "Already stopped");
                Ok(())
            }
            ReporterPhase::Prepared | ReporterPhase::Started => {
                debug!(target: "tally::reporter", reporter = self.name(), "Stopping...");
                self.phase = ReporterPhase::Stopped;
                let Some(mut sink) = self.sink.take() else {
                    return Ok(());
                };
                sink.stop().inspect_err(|err| {
                    warn!(
                        target: "tally::reporter",
                        reporter = self.name(),
                        %err,
                        "Sink failed to stop cleanly, releasing it anyway"
                    );
                })
            }
        }
    }
}
