//! Background reclamation of slots nobody is going to clean up.
//!
//! The dispatcher removes its own token on every path; the sweeper only catches
//! slots left behind by a dispatch that never got to run its cleanup.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::{
    task::{JoinError, JoinHandle},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    metrics::{MetricsHandle, noop_metrics},
    registry::CorrelationRegistry,
};

/// Sweeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Delay between sweep passes (default: 5 minutes, at least 1 ms).
    pub interval_ms: u64,
    /// Slots older than this are removed (default: 60 seconds).
    pub max_age_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
            max_age_secs: 60,
        }
    }
}

impl SweeperConfig {
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

pub struct Sweeper {
    registry: CorrelationRegistry,
    config: SweeperConfig,
    metrics: MetricsHandle,
}

impl Sweeper {
    pub fn new(registry: CorrelationRegistry, config: SweeperConfig) -> Self {
        Self {
            registry,
            config,
            metrics: noop_metrics(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run one sweep pass now.
    pub fn sweep_once(&self) -> usize {
        let removed = self.registry.sweep_expired(self.config.max_age_secs);
        if removed > 0 {
            warn!(removed, max_age_secs = self.config.max_age_secs, "reclaimed expired slots");
        } else {
            debug!("sweep found no expired slots");
        }
        self.metrics.record_swept(removed);
        removed
    }

    /// Start the periodic loop on the current tokio runtime.
    ///
    /// The first pass runs one interval after spawning.
    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let period = self.config.interval();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(?period, max_age_secs = self.config.max_age_secs, "sweeper started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                self.sweep_once();
            }
            debug!("sweeper loop exited");
        });

        SweeperHandle { cancel, join }
    }
}

/// Handle to a running sweeper loop.
pub struct SweeperHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the loop and wait for it to exit.
    ///
    /// No pass starts after the stop signal; a pass already running completes first.
    pub async fn stop(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
