use std::collections::BTreeMap;

/// Duration of every HTTP call, in milliseconds
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Number of HTTP calls issued
pub const HTTP_REQS: &str = "http_reqs";
/// Number of HTTP calls that failed at the transport level, including timeouts
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
/// Number of HTTP calls that exceeded their timeout
pub const HTTP_REQ_TIMEOUTS: &str = "http_req_timeouts";
pub const CHECKS_PASSED: &str = "checks_passed";
pub const CHECKS_FAILED: &str = "checks_failed";
/// Number of completed workflow iterations
pub const ITERATIONS: &str = "iterations";
/// Duration of a complete workflow iteration, including think time, in milliseconds
pub const ITERATION_DURATION: &str = "iteration_duration";
/// Live virtual user loops, sampled once per scheduler tick
pub const VUS: &str = "vus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A series of samples that percentiles and averages are computed over
    Trend,
    /// A monotonically increasing integer
    Counter,
}

/// The set of metrics a run is going to record.
///
/// Thresholds are validated against this before the run starts so that a typo in a metric name
/// is reported up front instead of silently passing at the end.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, MetricKind>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every metric the engine records on its own.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for trend in [HTTP_REQ_DURATION, ITERATION_DURATION, VUS] {
            registry.register_trend(trend);
        }
        for counter in [
            HTTP_REQS,
            HTTP_REQ_FAILED,
            HTTP_REQ_TIMEOUTS,
            CHECKS_PASSED,
            CHECKS_FAILED,
            ITERATIONS,
        ] {
            registry.register_counter(counter);
        }
        registry
    }

    pub fn register_trend(&mut self, name: &str) {
        self.metrics.insert(name.to_string(), MetricKind::Trend);
    }

    pub fn register_counter(&mut self, name: &str) {
        self.metrics.insert(name.to_string(), MetricKind::Counter);
    }

    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricKind)> {
        self.metrics.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}
