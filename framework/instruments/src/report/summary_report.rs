mod tables;

use itertools::Itertools;
use loadline_summary_model::RunResult;
use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::tables::{CounterRow, ThresholdRow, TrendRow};
use crate::report::ReportCollector;

/// Prints the run result as tables on stdout. Useful while developing scenarios and for people
/// watching a run from a terminal.
#[derive(Debug, Default)]
pub struct SummaryReportCollector;

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self
    }

    fn print_trends(result: &RunResult) {
        println!("\nSummary of trends");
        let rows = result
            .trends
            .iter()
            .map(|(metric, summary)| TrendRow {
                metric: metric.clone(),
                count: summary.count,
                avg: summary.avg,
                min: summary.min,
                p50: summary.p50,
                p90: summary.p90,
                p95: summary.p95,
                p99: summary.p99,
                max: summary.max,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_counters(result: &RunResult) {
        println!("\nCounters");
        let rows = result
            .counters
            .iter()
            .map(|(metric, value)| CounterRow {
                metric: metric.clone(),
                value: *value,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_thresholds(result: &RunResult) {
        if result.thresholds.is_empty() {
            return;
        }

        println!("\nThresholds");
        let rows = result
            .thresholds
            .iter()
            .map(|outcome| ThresholdRow {
                metric: outcome.metric.clone(),
                expected: outcome.expected.clone(),
                observed: outcome.observed,
                passed: outcome.passed,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }
}

impl ReportCollector for SummaryReportCollector {
    fn finalize(&self, result: &RunResult) {
        println!(
            "\nRun {} of {} finished after {:.1}s",
            result.run_id, result.scenario_name, result.elapsed_s
        );
        Self::print_trends(result);
        Self::print_counters(result);
        Self::print_thresholds(result);

        if result.undrained_vus > 0 {
            println!(
                "\n{} virtual users were still running when the run ended",
                result.undrained_vus
            );
        }

        if result.passed {
            println!("\nPASSED");
        } else {
            println!(
                "\nFAILED: {}",
                result
                    .failed_thresholds()
                    .map(|t| format!("{} {}", t.metric, t.expected))
                    .join(", ")
            );
        }
    }
}
