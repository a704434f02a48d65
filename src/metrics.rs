//! Injected metrics port.
//!
//! The orchestrator reports coarse workflow counters through this trait
//! instead of a process-wide registry; callers that do not care inject
//! [`NoopMetrics`].

/// Sink for provisioning workflow counters.
pub trait MetricsSink {
    /// Records instances reported by a capacity request.
    fn instances_launched(&self, count: usize);

    /// Records instances covered by a termination request.
    fn instances_terminated(&self, count: usize);

    /// Records spot requests cancelled after a failed fulfillment wait.
    fn spot_requests_cancelled(&self, count: usize);
}

/// Metrics sink that discards every observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn instances_launched(&self, _count: usize) {}

    fn instances_terminated(&self, _count: usize) {}

    fn spot_requests_cancelled(&self, _count: usize) {}
}
