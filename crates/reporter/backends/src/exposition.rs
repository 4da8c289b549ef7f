//! Pull-based exposition through a [`prometheus::Registry`].

use crate::BackendError;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder,
    core::{Collector, Desc},
    proto::MetricFamily,
};
use std::{
    collections::{HashMap, HashSet},
    fmt,
};
use tally_reporter::{
    ConfigScope, Distribution, ManagedReporter, Metric, MetricValue, Rates, ReporterBackend,
    ReporterError, ReporterSink, SharedFilter, SharedSource, SinkBuilder, TimeUnit,
};
use tracing::{debug, warn};

/// Prometheus reporter.
pub type PrometheusReporter = ManagedReporter<PrometheusBackend>;

/// Renders every metric family of `registry` in the text exposition format.
pub fn render(registry: &Registry) -> Result<String, BackendError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Backend registering the metric source with a [`Registry`] while started.
///
/// Metric names are prefixed with the domain (`metrics` unless configured), durations are in
/// seconds and rates per second unless configured otherwise.
#[derive(Clone)]
pub struct PrometheusBackend {
    registry: Registry,
}

impl fmt::Debug for PrometheusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusBackend").finish_non_exhaustive()
    }
}

impl Default for PrometheusBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusBackend {
    /// Backend name.
    pub const NAME: &'static str = "prometheus";
    /// Domain used when none is configured.
    pub const DEFAULT_DOMAIN: &'static str = "metrics";

    /// Creates a backend using the process-wide default registry.
    pub fn new() -> Self {
        Self::with_registry(prometheus::default_registry().clone())
    }

    /// Creates a backend using `registry`.
    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    /// The registry reports are exposed through.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl ReporterBackend for PrometheusBackend {
    type Builder = PrometheusBuilder;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn builder(
        &self,
        source: SharedSource,
        _scope: &ConfigScope<'_>,
    ) -> Result<Self::Builder, ReporterError> {
        Ok(PrometheusBuilder {
            registry: self.registry.clone(),
            source,
            domain: Self::DEFAULT_DOMAIN.to_string(),
            durations: TimeUnit::Seconds,
            rates: TimeUnit::Seconds,
            filter: None,
        })
    }
}

/// Builder for a [`PrometheusSink`].
pub struct PrometheusBuilder {
    registry: Registry,
    source: SharedSource,
    domain: String,
    durations: TimeUnit,
    rates: TimeUnit,
    filter: Option<SharedFilter>,
}

impl fmt::Debug for PrometheusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusBuilder")
            .field("domain", &self.domain)
            .field("durations", &self.durations)
            .field("rates", &self.rates)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl SinkBuilder for PrometheusBuilder {
    type Sink = PrometheusSink;

    fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
        self.durations = unit;
        self
    }

    fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
        self.rates = unit;
        self
    }

    fn in_domain(mut self, domain: String) -> Self {
        self.domain = domain;
        self
    }

    fn filter(mut self, filter: SharedFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn build(self) -> Result<Self::Sink, ReporterError> {
        let prefix = sanitize(&self.domain);
        let desc = Desc::new(
            format!("{prefix}_reporter_up"),
            format!("Whether metrics of domain {} are exposed", self.domain),
            Vec::new(),
            HashMap::new(),
        )
        .map_err(registry_error)?;

        Ok(PrometheusSink {
            registry: self.registry,
            collector: SourceCollector {
                source: self.source,
                filter: self.filter,
                prefix,
                durations: self.durations,
                rates: self.rates,
                desc,
            },
            registered: false,
        })
    }
}

/// Exposes a metric source through a [`Registry`] between `start` and `stop`.
pub struct PrometheusSink {
    registry: Registry,
    collector: SourceCollector,
    registered: bool,
}

impl fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusSink")
            .field("prefix", &self.collector.prefix)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

impl PrometheusSink {
    /// Name prefix derived from the domain, without the trailing `_`.
    pub fn prefix(&self) -> &str {
        &self.collector.prefix
    }

    /// Unit timer durations are exposed in.
    pub const fn durations(&self) -> TimeUnit {
        self.collector.durations
    }

    /// Unit rates are exposed per.
    pub const fn rates(&self) -> TimeUnit {
        self.collector.rates
    }

    /// Whether the collector is currently registered.
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// The registry this sink registers with.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl ReporterSink for PrometheusSink {
    fn start(&mut self) -> Result<(), ReporterError> {
        if self.registered {
            return Ok(());
        }
        self.registry.register(Box::new(self.collector.clone())).map_err(registry_error)?;
        self.registered = true;
        debug!(
            target: "tally::prometheus",
            prefix = %self.collector.prefix,
            "Collector registered"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ReporterError> {
        if !self.registered {
            return Ok(());
        }
        self.registered = false;
        self.registry.unregister(Box::new(self.collector.clone())).map_err(registry_error)?;
        debug!(
            target: "tally::prometheus",
            prefix = %self.collector.prefix,
            "Collector unregistered"
        );
        Ok(())
    }
}

impl Drop for PrometheusSink {
    fn drop(&mut self) {
        if self.registered {
            let _ = self.registry.unregister(Box::new(self.collector.clone()));
        }
    }
}

fn registry_error(err: prometheus::Error) -> ReporterError {
    ReporterError::backend(PrometheusBackend::NAME, BackendError::from(err))
}

/// Translates a snapshot into metric families on every scrape.
#[derive(Clone)]
struct SourceCollector {
    source: SharedSource,
    filter: Option<SharedFilter>,
    prefix: String,
    durations: TimeUnit,
    rates: TimeUnit,
    desc: Desc,
}

impl Collector for SourceCollector {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        match gauge(&self.desc.fq_name, &self.desc.help, 1.0, &[]) {
            Ok(up) => families.extend(up),
            Err(err) => {
                warn!(target: "tally::prometheus", %err, "Failed to expose reporter status")
            }
        }

        // Distinct source names may sanitise to the same family name.
        let mut exposed = HashSet::from([self.desc.fq_name.clone()]);
        for metric in self.source.filtered_snapshot(self.filter.as_ref()) {
            let mut collected = Vec::new();
            if let Err(err) = self.collect_metric(&metric, &mut collected) {
                warn!(target: "tally::prometheus", metric = %metric.name, %err, "Skipping metric");
                continue;
            }
            if let Some(taken) = collected.iter().find(|family| exposed.contains(family.name())) {
                warn!(
                    target: "tally::prometheus",
                    metric = %metric.name,
                    family = taken.name(),
                    "Skipping metric whose exposed name is already taken"
                );
                continue;
            }
            exposed.extend(collected.iter().map(|family| family.name().to_string()));
            families.extend(collected);
        }
        families
    }
}

impl SourceCollector {
    fn collect_metric(
        &self,
        metric: &Metric,
        families: &mut Vec<MetricFamily>,
    ) -> Result<(), prometheus::Error> {
        let name = format!("{}_{}", self.prefix, sanitize(&metric.name));
        let help = format!("{} {}", metric.kind(), metric.name);

        match &metric.value {
            MetricValue::Counter(count) => {
                let counter = IntCounter::with_opts(Opts::new(name, help))?;
                counter.inc_by(*count);
                families.extend(counter.collect());
            }
            MetricValue::Gauge(value) => families.extend(gauge(&name, &help, *value, &[])?),
            MetricValue::Histogram(distribution) => {
                distribution_families(families, &name, &help, distribution, &[])?;
            }
            MetricValue::Meter(rates) => {
                families.extend(gauge(&format!("{name}_count"), &help, rates.count as f64, &[])?);
                self.rate_family(families, &name, &help, rates)?;
            }
            MetricValue::Timer { durations, rates } => {
                let unit = self.durations;
                let durations = durations.map(|nanos| unit.convert_duration(nanos));
                let labels = [("duration_unit", unit.to_string())];
                distribution_families(families, &name, &help, &durations, &labels)?;
                self.rate_family(families, &name, &help, rates)?;
            }
        }
        Ok(())
    }

    fn rate_family(
        &self,
        families: &mut Vec<MetricFamily>,
        name: &str,
        help: &str,
        rates: &Rates,
    ) -> Result<(), prometheus::Error> {
        let labels = [("rate_unit", self.rates.rate_label())];
        let rate = self.rates.convert_rate(rates.mean_rate);
        families.extend(gauge(&format!("{name}_mean_rate"), help, rate, &labels)?);
        Ok(())
    }
}

fn distribution_families(
    families: &mut Vec<MetricFamily>,
    name: &str,
    help: &str,
    distribution: &Distribution,
    labels: &[(&str, String)],
) -> Result<(), prometheus::Error> {
    for (suffix, value) in [
        ("count", distribution.count as f64),
        ("min", distribution.min),
        ("max", distribution.max),
        ("mean", distribution.mean),
        ("stddev", distribution.stddev),
    ] {
        families.extend(gauge(&format!("{name}_{suffix}"), help, value, labels)?);
    }

    let quantiles = GaugeVec::new(with_labels(Opts::new(name, help), labels), &["quantile"])?;
    for (quantile, value) in distribution.quantiles() {
        quantiles.with_label_values(&[quantile.to_string().as_str()]).set(value);
    }
    families.extend(quantiles.collect());
    Ok(())
}

fn gauge(
    name: &str,
    help: &str,
    value: f64,
    labels: &[(&str, String)],
) -> Result<Vec<MetricFamily>, prometheus::Error> {
    let gauge = Gauge::with_opts(with_labels(Opts::new(name, help), labels))?;
    gauge.set(value);
    Ok(gauge.collect())
}

fn with_labels(opts: Opts, labels: &[(&str, String)]) -> Opts {
    labels.iter().fold(opts, |opts, (label, value)| opts.const_label(*label, value.clone()))
}

/// Maps `raw` onto the prometheus name alphabet.
fn sanitize(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
