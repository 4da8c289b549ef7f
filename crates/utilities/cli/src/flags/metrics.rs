//! Flags for the process's own prometheus metrics.

use crate::{MetricsError, init_prometheus_server};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};

/// Prometheus recorder flags.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Serve the process's own metrics over HTTP.
    #[arg(long = "metrics.enabled", global = true, env = "TALLY_METRICS_ENABLED")]
    pub enabled: bool,

    /// Address the metrics endpoint listens on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "TALLY_METRICS_ADDR"
    )]
    pub addr: IpAddr,

    /// Port the metrics endpoint listens on.
    #[arg(
        long = "metrics.port",
        global = true,
        default_value_t = 9090,
        env = "TALLY_METRICS_PORT"
    )]
    pub port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self::parse_from(["tally"])
    }
}

impl MetricsArgs {
    /// Installs the recorder when enabled.
    pub fn init_metrics(&self) -> Result<(), MetricsError> {
        if self.enabled {
            init_prometheus_server(self.addr, self.port)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        metrics: MetricsArgs,
    }

    #[test]
    fn test_disabled_by_default() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        assert!(!cli.metrics.enabled);
        assert_eq!(cli.metrics.port, 9090);
        assert!(cli.metrics.init_metrics().is_ok());
    }

    #[test]
    fn test_listen_address() {
        let args = ["test", "--metrics.addr", "127.0.0.1", "--metrics.port", "9100"];
        let cli = TestCli::try_parse_from(args).unwrap();
        assert_eq!(cli.metrics.addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(cli.metrics.port, 9100);
    }
}
