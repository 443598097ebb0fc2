use std::{net::SocketAddr, time::Duration};

use relay_core::{DispatchConfig, SweeperConfig};
use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_PREFIX;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address (default: `0.0.0.0:6527`).
    pub bind: SocketAddr,
    /// First path segment of every script route (default: `clip-save`).
    pub prefix: String,
    pub dispatch: DispatchConfig,
    pub sweeper: SweeperConfig,
    /// How long `stop` lets open connections finish before dropping them (default: 5 seconds).
    pub stop_grace_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 6527)),
            prefix: DEFAULT_PREFIX.to_string(),
            dispatch: DispatchConfig::default(),
            sweeper: SweeperConfig::default(),
            stop_grace_ms: 5_000,
        }
    }
}

impl GatewayConfig {
    #[inline]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}
