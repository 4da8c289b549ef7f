//! Metric filters resolved from configuration.

use crate::{ConfigScope, MetricKind, keys};
use auto_impl::auto_impl;
use glob::Pattern;
use serde_json::Value;
use std::{fmt::Debug, str::FromStr, sync::Arc};
use tracing::warn;

/// Decides whether a metric is reported.
#[auto_impl(&, Arc, Box)]
pub trait MetricFilter: Debug + Send + Sync {
    /// Returns `true` if the metric named `name` of kind `kind` passes.
    fn matches(&self, name: &str, kind: MetricKind) -> bool;
}

/// A filter shared read-only with the reporter that applies it.
pub type SharedFilter = Arc<dyn MetricFilter>;

/// Glob based [`MetricFilter`].
///
/// A metric passes when it matches at least one include pattern (or there are none), matches
/// no exclude pattern, and its kind is allowed (or no kind list is set).
#[derive(Debug, Clone, Default)]
pub struct GlobFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    kinds: Option<Vec<MetricKind>>,
}

impl GlobFilter {
    /// Creates a filter that lets everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an include pattern.
    pub fn include(mut self, pattern: &str) -> Result<Self, glob::PatternError> {
        self.include.push(Pattern::new(pattern)?);
        Ok(self)
    }

    /// Adds an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Result<Self, glob::PatternError> {
        self.exclude.push(Pattern::new(pattern)?);
        Ok(self)
    }

    /// Restricts the filter to the given metric kinds.
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        self.kinds.get_or_insert_with(Vec::new).extend(kinds);
        self
    }

    const fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && self.kinds.is_none()
    }

    /// Builds a filter from its configuration definition.
    ///
    /// Accepts a single pattern, a list of patterns, or an object with `include`, `exclude` and
    /// `kinds` entries.
    pub fn from_definition(value: &Value) -> Result<Self, String> {
        let filter = match value {
            Value::String(_) | Value::Array(_) => Self::new().with_patterns(value, Self::include)?,
            Value::Object(def) => {
                let mut filter = Self::new();
                if let Some(include) = def.get("include") {
                    filter = filter.with_patterns(include, Self::include)?;
                }
                if let Some(exclude) = def.get("exclude") {
                    filter = filter.with_patterns(exclude, Self::exclude)?;
                }
                if let Some(kinds) = def.get("kinds") {
                    let kinds = strings(kinds)?
                        .into_iter()
                        .map(|kind| {
                            MetricKind::from_str(kind.trim())
                                .map_err(|_| format!("unknown metric kind `{kind}`"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    filter = filter.kinds(kinds);
                }
                filter
            }
            other => return Err(format!("unsupported filter definition `{other}`")),
        };

        if filter.is_empty() {
            return Err("filter definition is empty".to_string());
        }
        Ok(filter)
    }

    fn with_patterns(
        self,
        value: &Value,
        add: fn(Self, &str) -> Result<Self, glob::PatternError>,
    ) -> Result<Self, String> {
        strings(value)?.into_iter().try_fold(self, |filter, pattern| {
            add(filter, pattern).map_err(|err| format!("invalid pattern `{pattern}`: {err}"))
        })
    }
}

impl MetricFilter for GlobFilter {
    fn matches(&self, name: &str, kind: MetricKind) -> bool {
        if let Some(kinds) = &self.kinds &&
            !kinds.contains(&kind)
        {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn strings(value: &Value) -> Result<Vec<&str>, String> {
    match value {
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(|| format!("expected a string, got `{item}`")))
            .collect(),
        other => Err(format!("expected a string or a list, got `{other}`")),
    }
}

/// Resolves the metric filter of a reporter, if one is configured.
///
/// Filters normally come from the process-wide `metrics.filter`. A reporter entry carrying its
/// own `filter` key overrides it outright; the two definitions are never merged. A malformed
/// definition is logged and treated as no filter.
pub fn resolve_filter(scope: &ConfigScope<'_>) -> Option<SharedFilter> {
    let definition = scope.get(keys::FILTER)?;
    if definition.is_null() {
        return None;
    }

    match GlobFilter::from_definition(definition) {
        Ok(filter) => Some(Arc::new(filter)),
        Err(reason) => {
            warn!(target: "tally::config", %reason, "Ignoring malformed metric filter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigMap;
    use serde_json::json;

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = GlobFilter::new();
        assert!(filter.matches("anything", MetricKind::Timer));
    }

    #[test]
    fn test_single_pattern_definition() {
        let filter = GlobFilter::from_definition(&json!("app.http.*")).unwrap();
        assert!(filter.matches("app.http.requests", MetricKind::Counter));
        assert!(!filter.matches("app.db.queries", MetricKind::Counter));
    }

    #[test]
    fn test_object_definition() {
        let filter = GlobFilter::from_definition(&json!({
            "include": ["app.*", "jvm.*"],
            "exclude": "app.debug.*",
            "kinds": ["counter", "TIMER"],
        }))
        .unwrap();

        assert!(filter.matches("app.requests", MetricKind::Counter));
        assert!(filter.matches("jvm.gc", MetricKind::Timer));
        assert!(!filter.matches("app.debug.loops", MetricKind::Counter));
        assert!(!filter.matches("app.requests", MetricKind::Gauge));
        assert!(!filter.matches("os.load", MetricKind::Counter));
    }

    #[test]
    fn test_malformed_definitions() {
        assert!(GlobFilter::from_definition(&json!("[oops")).is_err());
        assert!(GlobFilter::from_definition(&json!({})).is_err());
        assert!(GlobFilter::from_definition(&json!({ "kinds": ["sandwich"] })).is_err());
        assert!(GlobFilter::from_definition(&json!(["ok.*", 3])).is_err());
        assert!(GlobFilter::from_definition(&json!(12)).is_err());
    }

    #[test]
    fn test_resolve_filter_from_scope() {
        let process = match json!({ "metrics": { "filter": { "exclude": ["noisy.*"] } } }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let backend = ConfigMap::new();

        let filter = resolve_filter(&ConfigScope::new(&process, &backend)).unwrap();
        assert!(!filter.matches("noisy.metric", MetricKind::Gauge));
        assert!(filter.matches("quiet.metric", MetricKind::Gauge));

        let empty = ConfigMap::new();
        assert!(resolve_filter(&ConfigScope::new(&empty, &empty)).is_none());
    }

    #[test]
    fn test_backend_filter_overrides_process_filter() {
        let process = match json!({ "metrics": { "filter": { "exclude": ["app.noisy"] } } }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let backend = match json!({ "filter": "app.*" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let filter = resolve_filter(&ConfigScope::new(&process, &backend)).unwrap();
        assert!(filter.matches("app.requests", MetricKind::Counter));
        assert!(filter.matches("app.noisy", MetricKind::Counter));
        assert!(!filter.matches("other.metric", MetricKind::Counter));
    }
}
