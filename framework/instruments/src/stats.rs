use loadline_summary_model::TrendSummary;

use crate::collector::Sample;

/// Sample values in ascending order.
pub fn sorted_values(samples: &[Sample]) -> Vec<f64> {
    let mut values = samples.iter().map(|s| s.value).collect::<Vec<_>>();
    values.sort_by(f64::total_cmp);
    values
}

/// Percentile of an ascending slice using linear interpolation between the closest ranks.
///
/// `p` is a fraction in `0.0..=1.0`. The rank is `p * (n - 1)` over 0-indexed values, so p50 of
/// `[1, 2, 3, 4]` is 2.5. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn summarize_trend(samples: &[Sample]) -> TrendSummary {
    let sorted = sorted_values(samples);

    TrendSummary {
        count: sorted.len(),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        avg: mean(&sorted),
        p50: percentile(&sorted, 0.5),
        p90: percentile(&sorted, 0.9),
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
    }
}
