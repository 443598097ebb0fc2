use crate::metrics::backend::{DispatchOutcome, MetricsBackend};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_dispatched(&self) {}

    #[inline(always)]
    fn record_completed(&self, _: DispatchOutcome, _: u64) {}

    #[inline(always)]
    fn record_late_delivery(&self) {}

    #[inline(always)]
    fn record_swept(&self, _: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }
}
