use loadline_core::prelude::ConfigError;
use loadline_summary_model::ThresholdOutcome;

use crate::collector::MetricsSnapshot;
use crate::metrics::{MetricKind, MetricRegistry};
use crate::stats::{mean, percentile, sorted_values};

/// The aggregate a threshold is checked against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    /// Fraction in `0.0..=1.0`
    Percentile(f64),
    Median,
    Avg,
    Min,
    Max,
    /// Number of samples for a trend, or the value of a counter
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => (observed - bound).abs() < f64::EPSILON,
        }
    }
}

/// A pass/fail criterion over one metric, checked once when the run has finished.
///
/// Expressions look like `p(95)<500`, `p95 < 500ms`, `avg<200`, `count<100`. Bounds on latency
/// metrics are in milliseconds, a trailing `s` converts from seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    metric: String,
    expression: String,
    statistic: Statistic,
    comparison: Comparison,
    bound: f64,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidThreshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let compact = expression
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>();

        let op_at = compact
            .find(|c: char| matches!(c, '<' | '>' | '='))
            .ok_or_else(|| invalid("missing comparison operator"))?;
        let (statistic, rest) = compact.split_at(op_at);

        let (comparison, bound) = if let Some(b) = rest.strip_prefix("<=") {
            (Comparison::Le, b)
        } else if let Some(b) = rest.strip_prefix(">=") {
            (Comparison::Ge, b)
        } else if let Some(b) = rest.strip_prefix("==") {
            (Comparison::Eq, b)
        } else if let Some(b) = rest.strip_prefix('<') {
            (Comparison::Lt, b)
        } else if let Some(b) = rest.strip_prefix('>') {
            (Comparison::Gt, b)
        } else {
            return Err(invalid("unknown comparison operator"));
        };

        let statistic = parse_statistic(statistic).ok_or_else(|| invalid("unknown statistic"))?;
        let bound = parse_bound(bound).ok_or_else(|| invalid("bound is not a number"))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            statistic,
            comparison,
            bound,
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Check that the metric exists and the statistic makes sense for its kind.
    pub fn validate(&self, registry: &MetricRegistry) -> Result<(), ConfigError> {
        match registry.kind(&self.metric) {
            None => Err(ConfigError::UnknownMetric {
                metric: self.metric.clone(),
            }),
            Some(MetricKind::Counter) if self.statistic != Statistic::Count => {
                Err(ConfigError::InvalidThreshold {
                    metric: self.metric.clone(),
                    expression: self.expression.clone(),
                    reason: "only `count` can be used on a counter".to_string(),
                })
            }
            Some(_) => Ok(()),
        }
    }

    /// Compute the statistic from the snapshot and compare it with the bound.
    ///
    /// A trend with no samples passes every statistic except `count` without being compared,
    /// and the observed value is reported as `None`.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let observed = if let Some(value) = snapshot.counters.get(&self.metric) {
            if self.statistic != Statistic::Count {
                log::warn!(
                    "Threshold `{}` on counter {} cannot be evaluated",
                    self.expression,
                    self.metric
                );
                return self.outcome(None, false);
            }
            Some(*value as f64)
        } else {
            let sorted = sorted_values(snapshot.samples(&self.metric));
            match self.statistic {
                Statistic::Count => Some(sorted.len() as f64),
                Statistic::Percentile(p) => percentile(&sorted, p),
                Statistic::Median => percentile(&sorted, 0.5),
                Statistic::Avg => mean(&sorted),
                Statistic::Min => sorted.first().copied(),
                Statistic::Max => sorted.last().copied(),
            }
        };

        let passed = match observed {
            Some(observed) => self.comparison.holds(observed, self.bound),
            None => true,
        };

        self.outcome(observed, passed)
    }

    fn outcome(&self, observed: Option<f64>, passed: bool) -> ThresholdOutcome {
        ThresholdOutcome {
            metric: self.metric.clone(),
            expected: self.expression.clone(),
            observed,
            passed,
        }
    }
}

fn parse_statistic(value: &str) -> Option<Statistic> {
    match value {
        "count" => return Some(Statistic::Count),
        "avg" => return Some(Statistic::Avg),
        "min" => return Some(Statistic::Min),
        "max" => return Some(Statistic::Max),
        "med" => return Some(Statistic::Median),
        _ => {}
    }

    let number = value.strip_prefix('p')?;
    let number = number
        .strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .unwrap_or(number);
    let p: f64 = number.parse().ok()?;

    (0.0..=100.0)
        .contains(&p)
        .then_some(Statistic::Percentile(p / 100.0))
}

fn parse_bound(value: &str) -> Option<f64> {
    let (number, scale) = if let Some(n) = value.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix('s') {
        (n, 1000.0)
    } else {
        (value, 1.0)
    };

    let number: f64 = number.parse().ok()?;
    number.is_finite().then_some(number * scale)
}
