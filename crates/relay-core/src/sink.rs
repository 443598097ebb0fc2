use relay_model::{Outcome, RequestToken, ScriptResult};
use tracing::debug;

use crate::{
    metrics::{MetricsHandle, noop_metrics},
    registry::CorrelationRegistry,
};

/// Entry point the executor calls back through once a script finishes.
///
/// Cheap to clone; hand one to the executor side. Results for unknown, expired or
/// already resolved tokens are dropped silently.
#[derive(Clone)]
pub struct ResultSink {
    registry: CorrelationRegistry,
    metrics: MetricsHandle,
}

impl ResultSink {
    pub fn new(registry: CorrelationRegistry) -> Self {
        Self {
            registry,
            metrics: noop_metrics(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Deliver `outcome` for `token`. Returns whether a waiting request received it.
    pub fn deliver(&self, token: &RequestToken, outcome: Outcome) -> bool {
        let delivered = self.registry.deliver(token, outcome);
        if !delivered {
            debug!(%token, "dropping result for unknown or resolved token");
            self.metrics.record_late_delivery();
        }
        delivered
    }

    /// Deliver a result in executor wire form, keyed by the raw token string.
    pub fn deliver_result(&self, token: &str, result: ScriptResult) -> bool {
        match token.parse::<RequestToken>() {
            Ok(token) => self.deliver(&token, result.into()),
            Err(e) => {
                debug!(error = %e, "dropping result with malformed token");
                self.metrics.record_late_delivery();
                false
            }
        }
    }
}
