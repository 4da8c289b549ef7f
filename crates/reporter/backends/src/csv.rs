//! One CSV file per metric, one row per report.

use crate::{BackendError, Emitter, EmitterFactory, ReportFormat, Schedule, ScheduledBuilder};
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tally_reporter::{
    ConfigScope, Distribution, ManagedReporter, Metric, MetricValue, Rates, ReporterBackend,
    ReporterError, SharedSource, keys,
};
use tracing::debug;

/// CSV reporter.
pub type CsvReporter = ManagedReporter<CsvBackend>;

/// Scheduled backend appending rows to `<directory>/<metric>.csv`.
///
/// `directory` is required; it is created during `prepare` if missing.
#[derive(Debug, Default)]
pub struct CsvBackend;

impl CsvBackend {
    /// Backend name.
    pub const NAME: &'static str = "csv";

    /// Creates the backend.
    pub const fn new() -> Self {
        Self
    }
}

impl ReporterBackend for CsvBackend {
    type Builder = ScheduledBuilder<CsvDirectory>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn builder(
        &self,
        source: SharedSource,
        scope: &ConfigScope<'_>,
    ) -> Result<Self::Builder, ReporterError> {
        let directory =
            scope.string(keys::DIRECTORY).ok_or_else(|| ReporterError::BackendConfig {
                reporter: Self::NAME.to_string(),
                key: keys::DIRECTORY.to_string(),
                reason: "an output directory is required".to_string(),
            })?;
        let directory = CsvDirectory(PathBuf::from(directory));
        Ok(ScheduledBuilder::new(Self::NAME, source, Schedule::resolve(scope), directory))
    }
}

/// Output directory of a [`CsvBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDirectory(PathBuf);

impl EmitterFactory for CsvDirectory {
    type Emitter = CsvEmitter;

    fn create(
        self,
        reporter: &'static str,
        format: ReportFormat,
    ) -> Result<CsvEmitter, ReporterError> {
        fs::create_dir_all(&self.0)
            .map_err(|err| ReporterError::backend(reporter, BackendError::Io(err)))?;
        debug!(target: "tally::csv", directory = %self.0.display(), "Writing reports");
        Ok(CsvEmitter { directory: self.0, format, files: HashMap::new() })
    }
}

/// Appends one row per metric and report.
///
/// Each metric's file stays open for the emitter's lifetime.
#[derive(Debug)]
pub struct CsvEmitter {
    directory: PathBuf,
    format: ReportFormat,
    files: HashMap<String, File>,
}

impl CsvEmitter {
    /// Directory files are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, name: &str) -> PathBuf {
        let stem = match &self.format.domain {
            Some(domain) => format!("{domain}.{name}"),
            None => name.to_string(),
        };
        let stem: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }
            })
            .collect();
        self.directory.join(format!("{stem}.csv"))
    }

    /// Opens the file of `name` for appending, writing `header` into a new file.
    fn open(&self, name: &str, header: &str) -> io::Result<File> {
        let path = self.path(name);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "t,{header}")?;
        }
        debug!(target: "tally::csv", path = %path.display(), "Opened report file");
        Ok(file)
    }

    fn row(&self, value: &MetricValue) -> (String, String) {
        match value {
            MetricValue::Counter(count) => ("count".to_string(), count.to_string()),
            MetricValue::Gauge(value) => ("value".to_string(), value.to_string()),
            MetricValue::Histogram(distribution) => {
                (DISTRIBUTION_HEADER.to_string(), distribution_row(distribution))
            }
            MetricValue::Meter(rates) => (
                "count,mean_rate,rate_unit".to_string(),
                format!("{},{}", rates.count, self.rate_fields(rates)),
            ),
            MetricValue::Timer { durations, rates } => {
                let unit = self.format.durations;
                let durations = durations.map(|nanos| unit.convert_duration(nanos));
                (
                    format!("{DISTRIBUTION_HEADER},mean_rate,rate_unit,duration_unit"),
                    format!("{},{},{unit}", distribution_row(&durations), self.rate_fields(rates)),
                )
            }
        }
    }

    /// `mean_rate,rate_unit` in the configured rate unit.
    fn rate_fields(&self, rates: &Rates) -> String {
        let unit = self.format.rates;
        format!("{},{}", unit.convert_rate(rates.mean_rate), unit.rate_label())
    }
}

const DISTRIBUTION_HEADER: &str = "count,min,max,mean,stddev,p50,p75,p95,p98,p99,p999";

fn distribution_row(d: &Distribution) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        d.count, d.min, d.max, d.mean, d.stddev, d.p50, d.p75, d.p95, d.p98, d.p99, d.p999
    )
}

impl Emitter for CsvEmitter {
    fn emit(&mut self, timestamp: SystemTime, metrics: &[Metric]) -> io::Result<()> {
        let secs = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        for metric in metrics {
            let (header, row) = self.row(&metric.value);
            if !self.files.contains_key(&metric.name) {
                let file = self.open(&metric.name, &header)?;
                self.files.insert(metric.name.clone(), file);
            }

            let Some(file) = self.files.get_mut(&metric.name) else { continue };
            if let Err(err) = writeln!(file, "{secs},{row}") {
                // Reopened on the next report.
                self.files.remove(&metric.name);
                return Err(err);
            }
        }
        Ok(())
    }
}
