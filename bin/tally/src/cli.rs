//! Contains the tally CLI.

use crate::{demo::DemoTicker, flags::TallyArgs};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tally_backends::{PrometheusBackend, ScrapeServer, default_registry};
use tally_cli::{LogArgs, LogConfig, MetricsArgs, cli_styles};
use tally_reporter::{Launch, Metrics, ReporterDriver, SharedSource};
use tally_source::MetricRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the metric reporters configured for a process.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    about = "Runs the metric reporters configured for a process",
    styles = cli_styles()
)]
pub struct Cli {
    /// Global args
    #[command(flatten)]
    pub global: LogArgs,

    /// Prometheus metrics args
    #[command(flatten)]
    pub metrics: MetricsArgs,

    /// Reporter args
    #[command(flatten)]
    pub tally: TallyArgs,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        self.metrics.init_metrics()?;
        Metrics::init();

        self.init_logs(&self.global)?;

        Self::run_until_ctrl_c(async move {
            let process = self.tally.load_config().await?;

            let registry = MetricRegistry::new();
            let cancel_token = CancellationToken::new();
            let ticker = self.tally.demo_interval().map(|interval| {
                let ticker = DemoTicker::new(registry.clone(), interval, cancel_token.clone());
                tokio::spawn(ticker.run())
            });

            let source: SharedSource = Arc::new(registry);
            let Launch { running, failures } =
                ReporterDriver::new(default_registry()).launch(source, &process);
            if let Some(failures) = failures {
                warn!(target: "tally", %failures, "Some reporters failed to launch");
            }
            if running.is_empty() {
                warn!(target: "tally", "No reporter is running");
            } else {
                info!(target: "tally", reporters = ?running.names(), "Reporters running");
            }

            let scrapes = if running.names().contains(&PrometheusBackend::NAME) {
                let registry = prometheus::default_registry().clone();
                match ScrapeServer::bind(self.tally.scrape_addr(), registry).await {
                    Ok(server) => Some(tokio::spawn(server.serve(cancel_token.clone()))),
                    Err(err) => {
                        error!(target: "tally", %err, "Failed to bind the scrape endpoint");
                        None
                    }
                }
            } else {
                None
            };

            let signal = shutdown_signal().await?;
            info!(target: "tally", signal, "Shutting down reporters...");

            cancel_token.cancel();
            if let Some(ticker) = ticker {
                match ticker.await {
                    Ok(Err(err)) => error!(target: "tally", %err, "Demo ticker failed"),
                    Err(err) => error!(target: "tally", %err, "Demo ticker panicked"),
                    Ok(Ok(())) => {}
                }
            }
            if let Some(scrapes) = scrapes {
                match scrapes.await {
                    Ok(Err(err)) => error!(target: "tally", %err, "Scrape endpoint failed"),
                    Err(err) => error!(target: "tally", %err, "Scrape endpoint panicked"),
                    Ok(Ok(())) => {}
                }
            }

            if let Err(failures) = running.shutdown() {
                error!(target: "tally", %failures, "Some reporters failed to stop");
            }
            info!(target: "tally", "Reporters shut down.");
            Ok(())
        })
    }

    /// Run until ctrl-c is pressed.
    pub fn run_until_ctrl_c<F>(fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime().map_err(|e| anyhow::anyhow!(e))?;
        rt.block_on(fut)
    }

    /// Creates a new default tokio multi-thread [`Runtime`](tokio::runtime::Runtime) with all
    /// features enabled
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }

    /// Initializes the tracing subscriber.
    pub fn init_logs(&self, args: &LogArgs) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::from_default_env();

        LogConfig::new(args.clone()).init_tracing_subscriber(Some(filter))?;
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix, and names the signal received.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "ctrl-c"),
            _ = terminate.recv() => Ok("sigterm"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}
