mod collector;
mod metrics;
mod report;
mod stats;
mod threshold;

pub use collector::{MetricsCollector, MetricsSnapshot, Sample};
pub use metrics::*;
pub use report::{
    JsonReportCollector, ReportCollector, ReportConfig, Reporter, SummaryReportCollector,
};
pub use stats::{percentile, summarize_trend};
pub use threshold::{Comparison, Statistic, Threshold};
