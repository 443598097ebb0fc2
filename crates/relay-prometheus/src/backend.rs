use std::sync::Arc;

use prometheus::{
    CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use relay_core::{DispatchOutcome, MetricsBackend};

const NAMESPACE: &str = "relay";

/// Prometheus metrics backend for the relay.
///
/// ## Label cardinality
/// The only label is `outcome`, bounded to:
/// "success", "script_error", "timeout", "unavailable", "stopped", "expired".
#[derive(Clone)]
pub struct PrometheusMetrics {
    dispatched: IntCounter,
    completed: CounterVec,
    wait_duration: HistogramVec,
    late_deliveries: IntCounter,
    swept: IntCounter,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a new prometheus metrics backend with custom registry.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let dispatched = IntCounter::with_opts(
            Opts::new("requests_dispatched_total", "Requests handed to the executor")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(dispatched.clone()))?;

        let completed = CounterVec::new(
            Opts::new("requests_completed_total", "Requests finished, by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(completed.clone()))?;

        let wait_duration = HistogramVec::new(
            HistogramOpts::new(
                "request_wait_seconds",
                "Time a request waited for its script result",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(wait_duration.clone()))?;

        let late_deliveries = IntCounter::with_opts(
            Opts::new(
                "late_deliveries_total",
                "Results dropped because no request was waiting for them",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(late_deliveries.clone()))?;

        let swept = IntCounter::with_opts(
            Opts::new("slots_swept_total", "Abandoned slots reclaimed by the sweeper")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(swept.clone()))?;

        Ok(Self {
            dispatched,
            completed,
            wait_duration,
            late_deliveries,
            swept,
            registry,
        })
    }

    /// Create a new prometheus metrics backend with default registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.gather())
    }

    /// Get reference to underlying prometheus registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_dispatched(&self) {
        self.dispatched.inc();
    }

    fn record_completed(&self, outcome: DispatchOutcome, duration_ms: u64) {
        self.completed.with_label_values(&[outcome.as_label()]).inc();
        self.wait_duration
            .with_label_values(&[outcome.as_label()])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_late_delivery(&self) {
        self.late_deliveries.inc();
    }

    fn record_swept(&self, count: usize) {
        self.swept.inc_by(count as u64);
    }
}
