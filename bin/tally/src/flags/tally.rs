use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use tally_reporter::ConfigMap;
use tokio::fs;

/// Reporter configuration arguments.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TallyArgs {
    /// Process configuration file, JSON or TOML by extension. Reporters are listed under
    /// `metrics.reporters`.
    #[arg(long = "config", short = 'c', env = "TALLY_CONFIG")]
    pub config: PathBuf,

    /// Interval of the demo metric ticker in milliseconds. `0` disables it.
    #[arg(long = "demo.interval-ms", env = "TALLY_DEMO_INTERVAL_MS", default_value_t = 1000)]
    pub demo_interval_ms: u64,

    /// Address the `prometheus` reporter is scraped on.
    #[arg(
        long = "prometheus.addr",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "TALLY_PROMETHEUS_ADDR"
    )]
    pub prometheus_addr: IpAddr,

    /// Port the `prometheus` reporter is scraped on.
    #[arg(long = "prometheus.port", default_value_t = 9464, env = "TALLY_PROMETHEUS_PORT")]
    pub prometheus_port: u16,
}

impl TallyArgs {
    /// Interval of the demo ticker, if enabled.
    pub const fn demo_interval(&self) -> Option<Duration> {
        match self.demo_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Socket the scrape endpoint binds to.
    pub const fn scrape_addr(&self) -> SocketAddr {
        SocketAddr::new(self.prometheus_addr, self.prometheus_port)
    }

    /// Reads and parses the process configuration file.
    pub async fn load_config(&self) -> Result<ConfigMap> {
        let contents = fs::read_to_string(&self.config)
            .await
            .with_context(|| format!("Failed to read '{}'", self.config.display()))?;
        Self::parse_config(&self.config, &contents)
    }

    /// Parses `contents` as TOML when `path` ends in `.toml`, as JSON otherwise.
    pub fn parse_config(path: &Path, contents: &str) -> Result<ConfigMap> {
        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let value: serde_json::Value = if is_toml {
            toml::from_str(contents)
                .with_context(|| format!("Failed to parse TOML in '{}'", path.display()))?
        } else {
            serde_json::from_str(contents)
                .with_context(|| format!("Failed to parse JSON in '{}'", path.display()))?
        };

        match value {
            serde_json::Value::Object(map) => Ok(map),
            other => {
                bail!("'{}' must contain a table at the top level, got {other}", path.display())
            }
        }
    }
}
