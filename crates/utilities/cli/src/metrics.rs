//! Prometheus recorder for the process's own `metrics` facade.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Errors installing the metrics recorder.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The exporter could not be built or installed.
    #[error("failed to install prometheus recorder: {0}")]
    Build(#[from] BuildError),
}

/// Installs a global `metrics` recorder served over HTTP on `addr:port`.
pub fn init_prometheus_server(addr: IpAddr, port: u16) -> Result<(), MetricsError> {
    let listen = SocketAddr::from((addr, port));
    PrometheusBuilder::new().with_http_listener(listen).install()?;
    ::tracing::info!(target: "tally::cli", %listen, "Serving process metrics");
    Ok(())
}
