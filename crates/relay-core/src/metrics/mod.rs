//! Metrics collection abstraction for the relay core.
//!
//! Backends (prometheus, statsd, etc) implement [`MetricsBackend`] and are handed to
//! [`crate::Dispatcher`], [`crate::ResultSink`] and [`crate::Sweeper`].
mod backend;
pub use backend::{DispatchOutcome, MetricsBackend, MetricsHandle};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
