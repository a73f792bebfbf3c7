use prometheus_client::{metrics::counter::Counter, registry::Registry};

/// Metrics shared by every [super::Job] produced by a [super::Parser].
#[derive(Clone, Default)]
pub struct Metrics {
    /// Number of vertices accepted
    pub accepted: Counter,
    /// Number of vertices dropped (blocked, skipped, or invalid)
    pub dropped: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered in the provided registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "accepted",
            "Number of vertices accepted",
            metrics.accepted.clone(),
        );
        registry.register(
            "dropped",
            "Number of vertices dropped",
            metrics.dropped.clone(),
        );
        metrics
    }
}
