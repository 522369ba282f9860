use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use loadline_summary_model::{ThresholdOutcome, TrendSummary};
use parking_lot::Mutex;

use crate::metrics::{MetricKind, MetricRegistry};
use crate::stats::summarize_trend;
use crate::threshold::Threshold;

/// A single recorded value of a trend metric
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: Arc<str>,
    pub value: f64,
    pub timestamp: SystemTime,
}

/// A point in time copy of everything a [MetricsCollector] has recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub trends: BTreeMap<String, Vec<Sample>>,
    pub counters: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn samples(&self, metric: &str) -> &[Sample] {
        self.trends.get(metric).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn counter(&self, metric: &str) -> u64 {
        self.counters.get(metric).copied().unwrap_or_default()
    }

    pub fn summarize(&self) -> BTreeMap<String, TrendSummary> {
        self.trends
            .iter()
            .map(|(name, samples)| (name.clone(), summarize_trend(samples)))
            .collect()
    }
}

struct TrendSeries {
    name: Arc<str>,
    samples: Vec<Sample>,
}

impl TrendSeries {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            samples: Vec::new(),
        }
    }
}

#[derive(Default)]
struct CollectorState {
    trends: HashMap<String, TrendSeries>,
    counters: HashMap<String, u64>,
    frozen: bool,
}

/// Shared store for everything measured during a run.
///
/// One collector is created per run and handed to every virtual user. Writes take a short lock
/// and append or add, so they are safe from any number of threads. Once [MetricsCollector::freeze]
/// has been called all further writes are dropped.
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    pub fn new(registry: MetricRegistry) -> Self {
        let mut state = CollectorState::default();
        for (name, kind) in registry.iter() {
            match kind {
                MetricKind::Trend => {
                    state.trends.insert(name.to_string(), TrendSeries::new(name));
                }
                MetricKind::Counter => {
                    state.counters.insert(name.to_string(), 0);
                }
            }
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Append a sample to a trend metric.
    pub fn record(&self, metric: &str, value: f64) {
        let timestamp = SystemTime::now();

        let mut state = self.state.lock();
        if state.frozen {
            log::trace!("Dropping sample for {metric} recorded after the collector was frozen");
            return;
        }

        let series = state
            .trends
            .entry(metric.to_string())
            .or_insert_with(|| TrendSeries::new(metric));
        let sample = Sample {
            metric: series.name.clone(),
            value,
            timestamp,
        };
        series.samples.push(sample);
    }

    pub fn increment_counter(&self, metric: &str) {
        self.add_to_counter(metric, 1);
    }

    pub fn add_to_counter(&self, metric: &str, value: u64) {
        let mut state = self.state.lock();
        if state.frozen {
            log::trace!("Dropping counter update for {metric} after the collector was frozen");
            return;
        }

        *state.counters.entry(metric.to_string()).or_default() += value;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot {
            trends: state
                .trends
                .iter()
                .map(|(name, series)| (name.clone(), series.samples.clone()))
                .collect(),
            counters: state
                .counters
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
        }
    }

    /// Stop accepting writes. Everything recorded so far is kept.
    pub fn freeze(&self) {
        self.state.lock().frozen = true;
    }

    /// Evaluate thresholds against a snapshot taken now.
    pub fn evaluate(&self, thresholds: &[Threshold]) -> Vec<ThresholdOutcome> {
        let snapshot = self.snapshot();
        thresholds
            .iter()
            .map(|threshold| threshold.evaluate(&snapshot))
            .collect()
    }
}
