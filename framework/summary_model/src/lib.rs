use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Statistics computed over the samples of a trend metric.
///
/// All values are in the unit the samples were recorded in, which is milliseconds for request
/// and iteration durations. The statistics are `None` when the trend has no samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrendSummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

/// The outcome of evaluating one threshold at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOutcome {
    /// The metric the threshold was declared on
    pub metric: String,
    /// The threshold expression, for example `p(95)<500`
    pub expected: String,
    /// The value the expression was checked against
    ///
    /// This is `None` when the metric had no samples and the threshold passed vacuously.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Result of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    /// The unique run id
    ///
    /// Chosen by the runner unless one was supplied on the command line.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The total duration of the run profile, in seconds
    pub planned_duration_s: f64,
    /// How long the run actually took, including draining virtual users, in seconds
    ///
    /// This can be shorter than [RunResult::planned_duration_s] if the run was stopped early.
    pub elapsed_s: f64,
    /// Statistics for every trend metric, keyed by metric name
    pub trends: BTreeMap<String, TrendSummary>,
    /// The final value of every counter, keyed by metric name
    pub counters: BTreeMap<String, u64>,
    /// One entry per threshold, in the order the thresholds were declared
    pub thresholds: Vec<ThresholdOutcome>,
    /// The number of virtual users that were still running when the drain grace period ran out
    pub undrained_vus: usize,
    /// True when every threshold passed
    pub passed: bool,
}

impl RunResult {
    /// Create a new run result. The overall outcome is derived from the threshold outcomes.
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        planned_duration_s: f64,
        trends: BTreeMap<String, TrendSummary>,
        counters: BTreeMap<String, u64>,
        thresholds: Vec<ThresholdOutcome>,
    ) -> Self {
        let passed = thresholds.iter().all(|t| t.passed);
        Self {
            run_id,
            scenario_name,
            started_at,
            planned_duration_s,
            elapsed_s: 0.0,
            trends,
            counters,
            thresholds,
            undrained_vus: 0,
            passed,
        }
    }

    pub fn set_elapsed_s(&mut self, elapsed_s: f64) {
        self.elapsed_s = elapsed_s;
    }

    pub fn set_undrained_vus(&mut self, undrained_vus: usize) {
        self.undrained_vus = undrained_vus;
    }

    /// The value of a counter, or 0 if it was never recorded.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        self.trends.get(name)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

/// Serialize the run result to a writer as a single JSON object
pub fn store_run_result<W: Write>(run_result: &RunResult, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_result)?;
    Ok(())
}

/// Load a run result from a reader
pub fn load_run_result<R: Read>(reader: R) -> anyhow::Result<RunResult> {
    let reader = std::io::BufReader::new(reader);
    let run_result: RunResult = serde_json::from_reader(reader)?;
    Ok(run_result)
}
