//! Prometheus metrics backend for the script relay.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`relay_core::MetricsBackend`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use relay_core::{CorrelationRegistry, DispatchConfig, Dispatcher};
//! use relay_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let dispatcher = Dispatcher::new(CorrelationRegistry::new(), DispatchConfig::default())
//!     .with_metrics(Arc::new(metrics.clone()));
//!
//! // Render for a `/metrics` endpoint
//! let text = metrics.render()?;
//! # let _ = (dispatcher, text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `relay_requests_dispatched_total` - Counter
//! - `relay_requests_completed_total{outcome}` - Counter
//! - `relay_request_wait_seconds{outcome}` - Histogram
//! - `relay_late_deliveries_total` - Counter
//! - `relay_slots_swept_total` - Counter

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
