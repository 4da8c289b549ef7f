//! An in-memory metric source for processes that do not bring their own.
//!
//! [`MetricRegistry`] hands out get-or-create [`Counter`], [`Gauge`], [`Histogram`], [`Meter`]
//! and [`Timer`] handles and implements [`tally_reporter::MetricSource`], so it can be shared
//! with every reporter of the process.

mod registry;
pub use registry::{Counter, Gauge, Histogram, Meter, MetricRegistry, RegistryError, Timer};
