use std::sync::Arc;

use relay_model::Outcome;

use crate::error::DispatchError;

/// How a single dispatch ended, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Script returned a value (or nothing).
    Success,
    /// Script reported an error.
    ScriptError,
    /// No result within the dispatch timeout.
    Timeout,
    /// No executor hook was configured.
    Unavailable,
    /// Server stopped while waiting.
    Stopped,
    /// Slot was swept while waiting.
    Expired,
}

impl DispatchOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchOutcome::Success => "success",
            DispatchOutcome::ScriptError => "script_error",
            DispatchOutcome::Timeout => "timeout",
            DispatchOutcome::Unavailable => "unavailable",
            DispatchOutcome::Stopped => "stopped",
            DispatchOutcome::Expired => "expired",
        }
    }

    pub fn of(result: &Result<Outcome, DispatchError>) -> Self {
        match result {
            Ok(Outcome::Success(_)) => DispatchOutcome::Success,
            Ok(Outcome::Error(_)) => DispatchOutcome::ScriptError,
            Err(DispatchError::Timeout(_)) => DispatchOutcome::Timeout,
            Err(DispatchError::ExecutorUnavailable) => DispatchOutcome::Unavailable,
            Err(DispatchError::Stopped) => DispatchOutcome::Stopped,
            Err(DispatchError::Expired) => DispatchOutcome::Expired,
        }
    }
}

/// Backend metrics collection interface.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record an inbound request handed to the dispatcher.
    fn record_dispatched(&self);
    /// Record how a dispatch ended and how long the caller waited.
    ///
    /// # Arguments
    /// - `outcome`: How the dispatch terminated
    /// - `duration_ms`: Wait time in milliseconds
    fn record_completed(&self, outcome: DispatchOutcome, duration_ms: u64);
    /// Record a result that arrived for an unknown, expired or already resolved token.
    fn record_late_delivery(&self);
    /// Record slots reclaimed by one sweep pass.
    fn record_swept(&self, count: usize);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
