//! Key lookup and typed coercion over untyped configuration.

use super::{TimeUnit, keys};
use serde_json::Value;
use std::str::FromStr;

/// Untyped, string-keyed configuration mapping.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Looks up `key` in `map`.
///
/// The literal key wins. When it is absent and the key is dotted, nested objects are walked
/// instead, so `metrics.reporters` matches both a flat and a nested layout.
pub fn lookup<'a>(map: &'a ConfigMap, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }

    let (head, rest) = key.split_once('.')?;
    match map.get(head)? {
        Value::Object(nested) => lookup(nested, rest),
        _ => None,
    }
}

/// Coerces a value to a non-blank string. Numbers and booleans are rendered.
pub fn resolve_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerces a value to a [`TimeUnit`] by case-insensitive name.
pub fn resolve_time_unit(value: Option<&Value>) -> Option<TimeUnit> {
    match value? {
        Value::String(s) => TimeUnit::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Coerces a value to an unsigned integer. Numeric strings are accepted.
pub fn resolve_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a value to a boolean. `"true"` and `"false"` strings are accepted.
pub fn resolve_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
        _ => None,
    }
}

/// The pair of mappings a reporter is configured from.
///
/// Option keys are read from the backend-scoped mapping first and fall back to the
/// process-wide mapping under the `metrics.` prefix.
#[derive(Debug, Clone, Copy)]
pub struct ConfigScope<'a> {
    process: &'a ConfigMap,
    backend: &'a ConfigMap,
}

impl<'a> ConfigScope<'a> {
    /// Creates a scope over the process-wide and backend-scoped mappings.
    pub const fn new(process: &'a ConfigMap, backend: &'a ConfigMap) -> Self {
        Self { process, backend }
    }

    /// The process-wide mapping.
    pub const fn process(&self) -> &'a ConfigMap {
        self.process
    }

    /// The backend-scoped mapping.
    pub const fn backend(&self) -> &'a ConfigMap {
        self.backend
    }

    /// Raw value of an option key, backend-scoped first.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        lookup(self.backend, key)
            .or_else(|| lookup(self.process, &format!("{}.{key}", keys::PROCESS_PREFIX)))
    }

    /// Non-blank string option.
    pub fn string(&self, key: &str) -> Option<String> {
        resolve_string(self.get(key))
    }

    /// Time unit option.
    pub fn time_unit(&self, key: &str) -> Option<TimeUnit> {
        resolve_time_unit(self.get(key))
    }

    /// Unsigned integer option.
    pub fn u64(&self, key: &str) -> Option<u64> {
        resolve_u64(self.get(key))
    }

    /// Boolean option.
    pub fn bool(&self, key: &str) -> Option<bool> {
        resolve_bool(self.get(key))
    }
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
    fn test_lookup_prefers_literal_key() {
        let config = map(json!({
            "metrics.reporters": "flat",
            "metrics": { "reporters": "nested" },
        }));
        assert_eq!(lookup(&config, "metrics.reporters"), Some(&json!("flat")));
    }

    #[test]
    fn test_lookup_walks_nested_objects() {
        let config = map(json!({ "metrics": { "filter": { "include": ["a.*"] } } }));
        assert_eq!(lookup(&config, "metrics.filter.include"), Some(&json!(["a.*"])));
        assert_eq!(lookup(&config, "metrics.missing"), None);
        assert_eq!(lookup(&config, "missing.key"), None);
    }

    #[test]
    fn test_lookup_stops_at_scalars() {
        let config = map(json!({ "metrics": 3 }));
        assert_eq!(lookup(&config, "metrics.reporters"), None);
    }

    #[test]
    fn test_resolve_string() {
        assert_eq!(resolve_string(Some(&json!("app.metrics"))), Some("app.metrics".to_string()));
        assert_eq!(resolve_string(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(resolve_string(Some(&json!(true))), Some("true".to_string()));
        assert_eq!(resolve_string(Some(&json!(""))), None);
        assert_eq!(resolve_string(Some(&json!("   "))), None);
        assert_eq!(resolve_string(Some(&json!(null))), None);
        assert_eq!(resolve_string(Some(&json!(["a"]))), None);
        assert_eq!(resolve_string(None), None);
    }

    #[test]
    fn test_resolve_time_unit() {
        assert_eq!(resolve_time_unit(Some(&json!(" SECONDS "))), Some(TimeUnit::Seconds));
        assert_eq!(resolve_time_unit(Some(&json!("weeks"))), None);
        assert_eq!(resolve_time_unit(Some(&json!(1))), None);
        assert_eq!(resolve_time_unit(None), None);
    }

    #[test]
    fn test_resolve_numbers_and_bools() {
        assert_eq!(resolve_u64(Some(&json!(15))), Some(15));
        assert_eq!(resolve_u64(Some(&json!("15"))), Some(15));
        assert_eq!(resolve_u64(Some(&json!(-1))), None);
        assert_eq!(resolve_u64(Some(&json!(1.5))), None);
        assert_eq!(resolve_bool(Some(&json!(true))), Some(true));
        assert_eq!(resolve_bool(Some(&json!("FALSE"))), Some(false));
        assert_eq!(resolve_bool(Some(&json!("yes"))), None);
    }

    #[test]
    fn test_scope_reads_backend_first() {
        let process =
            map(json!({ "metrics": { "duration-unit": "minutes", "rate-unit": "hours" } }));
        let backend = map(json!({ "duration-unit": "seconds" }));
        let scope = ConfigScope::new(&process, &backend);

        assert_eq!(scope.time_unit(keys::DURATION_UNIT), Some(TimeUnit::Seconds));
        assert_eq!(scope.time_unit(keys::RATE_UNIT), Some(TimeUnit::Hours));
        assert_eq!(scope.string(keys::DOMAIN), None);
    }
}
