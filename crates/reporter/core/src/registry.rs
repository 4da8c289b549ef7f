//! Backend name → reporter factory.

use crate::Reporter;
use std::{collections::BTreeMap, fmt};

type Factory = Box<dyn Fn() -> Box<dyn Reporter> + Send + Sync>;

/// Registry of reporter backends, keyed by lower-cased backend name.
///
/// Adding a backend only requires registering a factory; the driver never enumerates backends
/// itself.
#[derive(Default)]
pub struct ReporterRegistry {
    factories: BTreeMap<String, Factory>,
}

impl fmt::Debug for ReporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterRegistry").field("backends", &self.names()).finish()
    }
}

impl ReporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any previous factory for it.
    pub fn register<F, R>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Reporter + 'static,
    {
        self.factories
            .insert(
                name.to_ascii_lowercase(),
                Box::new(move || Box::new(factory()) as Box<dyn Reporter>),
            );
        self
    }

    /// Whether a backend named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Constructs a fresh, unprepared reporter for `name`.
    pub fn create(&self, name: &str) -> Option<Box<dyn Reporter>> {
        self.factories.get(&name.to_ascii_lowercase()).map(|factory| factory())
    }
}
