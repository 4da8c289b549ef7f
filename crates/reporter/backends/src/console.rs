//! Human-readable reports on stdout, stderr or an injected writer.

use crate::{Emitter, EmitterFactory, ReportFormat, Schedule, ScheduledBuilder};
use std::{
    fmt,
    io::{self, Write},
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};
use tally_reporter::{
    ConfigScope, Distribution, ManagedReporter, Metric, MetricKind, MetricValue, Rates,
    ReporterBackend, ReporterError, SharedSource, keys,
};
use tracing::warn;

/// Console reporter.
pub type ConsoleReporter = ManagedReporter<ConsoleBackend>;

const WIDTH: usize = 80;

/// Where console reports go.
#[derive(Clone, Default)]
pub enum ConsoleOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A caller supplied writer.
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl fmt::Debug for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("Stdout"),
            Self::Stderr => f.write_str("Stderr"),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            other => Err(format!("unknown console output `{other}`")),
        }
    }
}

impl ConsoleOutput {
    fn write_report(&self, report: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(report)?;
                out.flush()
            }
            Self::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(report)?;
                out.flush()
            }
            Self::Writer(writer) => {
                let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
                out.write_all(report)?;
                out.flush()
            }
        }
    }
}

/// Scheduled backend printing a grouped text report.
///
/// The `output` key selects stdout (default) or stderr unless a writer was injected through
/// [`ConsoleBackend::with_output`].
#[derive(Debug, Default)]
pub struct ConsoleBackend {
    output: Option<ConsoleOutput>,
}

impl ConsoleBackend {
    /// Backend name.
    pub const NAME: &'static str = "console";

    /// Creates a backend whose output comes from configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that always writes to `output`.
    pub const fn with_output(output: ConsoleOutput) -> Self {
        Self { output: Some(output) }
    }

    fn resolve_output(&self, scope: &ConfigScope<'_>) -> ConsoleOutput {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let Some(raw) = scope.string(keys::OUTPUT) else {
            return ConsoleOutput::Stdout;
        };
        raw.parse().unwrap_or_else(|err| {
            warn!(target: "tally::console", %err, "Falling back to stdout");
            ConsoleOutput::Stdout
        })
    }
}

impl ReporterBackend for ConsoleBackend {
    type Builder = ScheduledBuilder<ConsoleOutput>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn builder(
        &self,
        source: SharedSource,
        scope: &ConfigScope<'_>,
    ) -> Result<Self::Builder, ReporterError> {
        let output = self.resolve_output(scope);
        Ok(ScheduledBuilder::new(Self::NAME, source, Schedule::resolve(scope), output))
    }
}

impl EmitterFactory for ConsoleOutput {
    type Emitter = ConsoleEmitter;

    fn create(
        self,
        _reporter: &'static str,
        format: ReportFormat,
    ) -> Result<ConsoleEmitter, ReporterError> {
        Ok(ConsoleEmitter { output: self, format })
    }
}

/// Renders reports and hands them to a [`ConsoleOutput`].
#[derive(Debug)]
pub struct ConsoleEmitter {
    output: ConsoleOutput,
    format: ReportFormat,
}

impl Emitter for ConsoleEmitter {
    fn emit(&mut self, timestamp: SystemTime, metrics: &[Metric]) -> io::Result<()> {
        let mut report = Vec::new();
        render(&mut report, timestamp, metrics, &self.format)?;
        self.output.write_report(&report)
    }
}

const SECTIONS: [(MetricKind, &str); 5] = [
    (MetricKind::Gauge, "Gauges"),
    (MetricKind::Counter, "Counters"),
    (MetricKind::Histogram, "Histograms"),
    (MetricKind::Meter, "Meters"),
    (MetricKind::Timer, "Timers"),
];

fn render(
    out: &mut impl Write,
    timestamp: SystemTime,
    metrics: &[Metric],
    format: &ReportFormat,
) -> io::Result<()> {
    let secs = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let title = match &format.domain {
        Some(domain) => format!("{domain} @ {secs} "),
        None => format!("{secs} "),
    };
    writeln!(out, "{title:=<width$}", width = WIDTH)?;

    for (kind, heading) in SECTIONS {
        let mut section = metrics.iter().filter(|metric| metric.kind() == kind).peekable();
        if section.peek().is_none() {
            continue;
        }

        writeln!(out, "{:-<width$}", format!("-- {heading} "), width = WIDTH)?;
        for metric in section {
            writeln!(out, "{}", metric.name)?;
            match &metric.value {
                MetricValue::Counter(count) => line(out, "count", count)?,
                MetricValue::Gauge(value) => line(out, "value", value)?,
                MetricValue::Histogram(distribution) => {
                    line(out, "count", distribution.count)?;
                    distribution_lines(out, distribution, "")?;
                }
                MetricValue::Meter(rates) => rate_lines(out, rates, format)?,
                MetricValue::Timer { durations, rates } => {
                    rate_lines(out, rates, format)?;
                    let unit = format.durations;
                    let durations = durations.map(|nanos| unit.convert_duration(nanos));
                    distribution_lines(out, &durations, &format!(" {unit}"))?;
                }
            }
        }
        writeln!(out)?;
    }
    writeln!(out)
}

fn line(out: &mut impl Write, label: &str, value: impl fmt::Display) -> io::Result<()> {
    writeln!(out, "{label:>18} = {value}")
}

fn rate_lines(out: &mut impl Write, rates: &Rates, format: &ReportFormat) -> io::Result<()> {
    line(out, "count", rates.count)?;
    let rate = format.rates.convert_rate(rates.mean_rate);
    line(out, "mean rate", format_args!("{rate:.2} {}", format.rates.rate_label()))
}

fn distribution_lines(
    out: &mut impl Write,
    distribution: &Distribution,
    suffix: &str,
) -> io::Result<()> {
    line(out, "min", format_args!("{:.2}{suffix}", distribution.min))?;
    line(out, "max", format_args!("{:.2}{suffix}", distribution.max))?;
    line(out, "mean", format_args!("{:.2}{suffix}", distribution.mean))?;
    line(out, "stddev", format_args!("{:.2}{suffix}", distribution.stddev))?;
    line(out, "median", format_args!("{:.2}{suffix}", distribution.p50))?;
    for (label, value) in [
        ("75% <=", distribution.p75),
        ("95% <=", distribution.p95),
        ("98% <=", distribution.p98),
        ("99% <=", distribution.p99),
        ("99.9% <=", distribution.p999),
    ] {
        line(out, label, format_args!("{value:.2}{suffix}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tally_reporter::{ConfigMap, Reporter, ReporterPhase, TimeUnit};
    use tally_source::MetricRegistry;

    fn rendered(metrics: &[Metric], format: &ReportFormat) -> String {
        let mut out = Vec::new();
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        render(&mut out, at, metrics, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_output_from_str() {
        assert!(matches!("STDERR".parse::<ConsoleOutput>(), Ok(ConsoleOutput::Stderr)));
        assert!(matches!(" stdout ".parse::<ConsoleOutput>(), Ok(ConsoleOutput::Stdout)));
        assert!("syslog".parse::<ConsoleOutput>().is_err());
    }

    #[test]
    fn test_render_groups_by_kind() {
        let metrics = vec![
            Metric::new("jobs.done", MetricValue::Counter(3)),
            Metric::new("pool.usage", MetricValue::Gauge(0.5)),
        ];

        let report = rendered(&metrics, &ReportFormat::default());
        let gauges = report.find("-- Gauges").unwrap();
        let counters = report.find("-- Counters").unwrap();
        assert!(report.starts_with("1700000000 ====="));
        assert!(gauges < counters);
        assert!(report.contains("pool.usage\n             value = 0.5\n"));
        assert!(report.contains("jobs.done\n             count = 3\n"));
        assert!(!report.contains("-- Timers"));
    }

    #[test]
    fn test_render_converts_timer_units() {
        let durations = Distribution::from_window(1, &[1_500_000_000.0]);
        let metrics = vec![Metric::new(
            "db.query",
            MetricValue::Timer { durations, rates: Rates { count: 1, mean_rate: 2.0 } },
        )];
        let format = ReportFormat {
            durations: TimeUnit::Seconds,
            rates: TimeUnit::Minutes,
            domain: Some("app.metrics".to_string()),
        };

        let report = rendered(&metrics, &format);
        assert!(report.starts_with("app.metrics @ 1700000000 ="));
        assert!(report.contains("mean rate = 120.00 events/minute"));
        assert!(report.contains("max = 1.50 seconds"));
    }

    #[tokio::test]
    async fn test_reports_to_injected_writer() {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let output = ConsoleOutput::Writer(buffer.clone());
        let mut reporter = ConsoleReporter::new(ConsoleBackend::with_output(output));

        let registry = MetricRegistry::new();
        registry.counter("requests").unwrap().inc_by(7);
        let backend = json!({ "period": 20, "period-unit": "milliseconds" });
        let backend = backend.as_object().cloned().unwrap();

        reporter.prepare(Arc::new(registry), &ConfigMap::new(), &backend).unwrap();
        reporter.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        reporter.stop().unwrap();
        assert_eq!(reporter.phase(), ReporterPhase::Stopped);

        let written = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(written.contains("requests\n             count = 7\n"));

        let len = buffer.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(buffer.lock().unwrap().len(), len);
    }
}
