//! The reporter contract and its shared state machine.

mod error;
pub use error::{Operation, ReporterError};

mod traits;
pub use traits::{Reporter, ReporterBackend, ReporterPhase, ReporterSink, SinkBuilder};

mod managed;
pub use managed::ManagedReporter;
