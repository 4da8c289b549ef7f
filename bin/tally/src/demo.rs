//! Demo metrics so that a freshly configured process has something to report.

use std::time::{Duration, Instant};
use tally_source::{MetricRegistry, RegistryError};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Updates an uptime gauge, a tick counter and a tick timer on every interval.
#[derive(Debug, derive_more::Constructor)]
pub struct DemoTicker {
    registry: MetricRegistry,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl DemoTicker {
    /// Uptime in seconds.
    pub const UPTIME: &'static str = "tally.demo.uptime";
    /// Number of ticks.
    pub const TICKS: &'static str = "tally.demo.ticks";
    /// Time spent per tick.
    pub const TICK_DURATION: &'static str = "tally.demo.tick-duration";

    /// Ticks until cancelled.
    pub async fn run(self) -> Result<(), RegistryError> {
        info!(target: "tally::demo", interval = ?self.interval, "Starting demo ticker");

        let started = Instant::now();
        let uptime = self.registry.gauge(Self::UPTIME)?;
        let ticks = self.registry.counter(Self::TICKS)?;
        let tick_duration = self.registry.timer(Self::TICK_DURATION)?;
        let mut ticker = interval(self.interval);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    tick_duration.time(|| {
                        uptime.set(started.elapsed().as_secs_f64());
                        ticks.inc();
                    });
                }
            }
        }

        debug!(target: "tally::demo", ticks = ticks.get(), "Demo ticker stopped");
        Ok(())
    }
}
