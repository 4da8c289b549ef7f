//! Typed options shared by every reporter backend.

use super::{ConfigScope, TimeUnit, keys};
use crate::{SharedFilter, SinkBuilder, resolve_filter};
use tracing::debug;

/// Cross-backend options resolved from a [`ConfigScope`].
///
/// Each field is `None` when the corresponding key is absent or malformed, in which case the
/// backend keeps its own default.
#[derive(Debug, Clone, Default)]
pub struct ReporterOptions {
    /// Unit timer durations are converted to.
    pub duration_unit: Option<TimeUnit>,
    /// Unit rates are expressed per.
    pub rate_unit: Option<TimeUnit>,
    /// Grouping label for reported metrics.
    pub domain: Option<String>,
    /// Filter deciding which metrics are reported.
    pub filter: Option<SharedFilter>,
}

impl ReporterOptions {
    /// Resolves every option from the scope. Never fails.
    pub fn resolve(scope: &ConfigScope<'_>) -> Self {
        let options = Self {
            duration_unit: scope.time_unit(keys::DURATION_UNIT),
            rate_unit: scope.time_unit(keys::RATE_UNIT),
            domain: scope.string(keys::DOMAIN).or_else(|| scope.string(keys::NAMESPACE)),
            filter: resolve_filter(scope),
        };

        debug!(
            target: "tally::config",
            duration_unit = ?options.duration_unit,
            rate_unit = ?options.rate_unit,
            domain = ?options.domain,
            filtered = options.filter.is_some(),
            "Resolved reporter options"
        );
        options
    }

    /// Hands every resolved option to `builder`. Unresolved options are never passed, so the
    /// builder keeps its default for them.
    pub fn apply<B: SinkBuilder>(&self, mut builder: B) -> B {
        if let Some(unit) = self.duration_unit {
            builder = builder.convert_durations_to(unit);
        }
        if let Some(unit) = self.rate_unit {
            builder = builder.convert_rates_to(unit);
        }
        if let Some(domain) = &self.domain {
            builder = builder.in_domain(domain.clone());
        }
        if let Some(filter) = &self.filter {
            builder = builder.filter(filter.clone());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigMap, ReporterError, ReporterSink};
    use serde_json::{Value, json};

    fn map(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[derive(Debug)]
    struct NoopSink;

    impl ReporterSink for NoopSink {
        fn start(&mut self) -> Result<(), ReporterError> {
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ReporterError> {
            Ok(())
        }
    }

    /// Records which setters were called.
    #[derive(Debug, Default)]
    struct RecordingBuilder {
        calls: Vec<String>,
    }

    impl SinkBuilder for RecordingBuilder {
        type Sink = NoopSink;

        fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
            self.calls.push(format!("durations:{unit}"));
            self
        }

        fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
            self.calls.push(format!("rates:{unit}"));
            self
        }

        fn in_domain(mut self, domain: String) -> Self {
            self.calls.push(format!("domain:{domain}"));
            self
        }

        fn filter(mut self, _filter: SharedFilter) -> Self {
            self.calls.push("filter".to_string());
            self
        }

        fn build(self) -> Result<Self::Sink, ReporterError> {
            Ok(NoopSink)
        }
    }

    #[test]
    fn test_resolve_duration_and_domain_only() {
        let process = ConfigMap::new();
        let backend = map(json!({ "duration-unit": "SECONDS", "domain": "app.metrics" }));
        let options = ReporterOptions::resolve(&ConfigScope::new(&process, &backend));

        assert_eq!(options.duration_unit, Some(TimeUnit::Seconds));
        assert_eq!(options.domain.as_deref(), Some("app.metrics"));
        assert_eq!(options.rate_unit, None);
        assert!(options.filter.is_none());

        let builder = options.apply(RecordingBuilder::default());
        assert_eq!(builder.calls, vec!["durations:seconds", "domain:app.metrics"]);
    }

    #[test]
    fn test_missing_keys_leave_builder_untouched() {
        let empty = ConfigMap::new();
        let options = ReporterOptions::resolve(&ConfigScope::new(&empty, &empty));

        assert!(options.duration_unit.is_none());
        assert!(options.rate_unit.is_none());
        assert!(options.domain.is_none());
        assert!(options.filter.is_none());
        assert!(options.apply(RecordingBuilder::default()).calls.is_empty());
    }

    #[test]
    fn test_malformed_values_resolve_to_none() {
        let process = ConfigMap::new();
        let backend = map(json!({
            "duration-unit": "fortnights",
            "rate-unit": 7,
            "domain": "  ",
            "filter": { "include": ["[unclosed"] },
        }));
        let options = ReporterOptions::resolve(&ConfigScope::new(&process, &backend));

        assert!(options.duration_unit.is_none());
        assert!(options.rate_unit.is_none());
        assert!(options.domain.is_none());
        assert!(options.filter.is_none());
    }

    #[test]
    fn test_namespace_alias_and_process_fallback() {
        let process = map(json!({
            "metrics": { "rate-unit": "minutes", "filter": "app.*" },
        }));
        let backend = map(json!({ "namespace": "svc" }));
        let options = ReporterOptions::resolve(&ConfigScope::new(&process, &backend));

        assert_eq!(options.domain.as_deref(), Some("svc"));
        assert_eq!(options.rate_unit, Some(TimeUnit::Minutes));
        assert!(options.filter.is_some());

        let builder = options.apply(RecordingBuilder::default());
        assert_eq!(builder.calls, vec!["rates:minutes", "domain:svc", "filter"]);
    }
}
