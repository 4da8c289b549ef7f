//! Process-wide reporter selection.

use super::{ConfigMap, keys, lookup};
use serde_json::Value;
use tracing::warn;

/// One configured reporter: the backend it selects and its scoped configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterEntry {
    /// Lower-cased backend name.
    pub backend: String,
    /// Backend-scoped configuration, including the `type` key when given as an object.
    pub config: ConfigMap,
}

/// Reporter selection parsed once from the process-wide configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsConfig {
    /// Entries in configuration order.
    pub reporters: Vec<ReporterEntry>,
}

impl MetricsConfig {
    /// Reads `metrics.reporters` from the process-wide mapping.
    ///
    /// Each entry is either a backend name or an object whose `type` names the backend. Entries
    /// without a usable name are skipped. A missing or non-list key selects no reporter.
    pub fn from_process(process: &ConfigMap) -> Self {
        let Some(raw) = lookup(process, keys::REPORTERS) else {
            return Self::default();
        };

        let Value::Array(items) = raw else {
            warn!(
                target: "tally::config",
                key = keys::REPORTERS,
                "Reporter list is not an array, ignoring"
            );
            return Self::default();
        };

        let reporters = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let entry = Self::entry(item);
                if entry.is_none() {
                    warn!(
                        target: "tally::config",
                        index,
                        "Reporter entry has no backend type, skipping"
                    );
                }
                entry
            })
            .collect();

        Self { reporters }
    }

    fn entry(item: &Value) -> Option<ReporterEntry> {
        match item {
            Value::String(name) => Some(ReporterEntry {
                backend: normalize(name)?,
                config: ConfigMap::new(),
            }),
            Value::Object(config) => {
                let name = config.get(keys::BACKEND_TYPE)?.as_str()?;
                Some(ReporterEntry { backend: normalize(name)?, config: config.clone() })
            }
            _ => None,
        }
    }
}

fn normalize(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ConfigMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_no_reporters_configured() {
        assert!(MetricsConfig::from_process(&ConfigMap::new()).reporters.is_empty());
        let config = map(json!({ "metrics": { "reporters": "console" } }));
        assert!(MetricsConfig::from_process(&config).reporters.is_empty());
    }

    #[test]
    fn test_entries_in_order() {
        let config = map(json!({
            "metrics": {
                "reporters": [
                    "Console",
                    { "type": "csv", "directory": "/tmp/out" },
                    { "directory": "/tmp/missing-type" },
                    { "type": "  " },
                    17,
                ],
            },
        }));

        let parsed = MetricsConfig::from_process(&config);
        assert_eq!(parsed.reporters.len(), 2);
        assert_eq!(parsed.reporters[0].backend, "console");
        assert!(parsed.reporters[0].config.is_empty());
        assert_eq!(parsed.reporters[1].backend, "csv");
        assert_eq!(parsed.reporters[1].config.get("directory"), Some(&json!("/tmp/out")));
    }

    #[test]
    fn test_flat_key_layout() {
        let config = map(json!({ "metrics.reporters": [{ "type": "prometheus" }] }));
        let parsed = MetricsConfig::from_process(&config);
        assert_eq!(parsed.reporters[0].backend, "prometheus");
    }
}
