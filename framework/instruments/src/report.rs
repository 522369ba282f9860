mod json_report;
mod summary_report;

use loadline_summary_model::RunResult;

pub use json_report::JsonReportCollector;
pub use summary_report::SummaryReportCollector;

/// Somewhere to send the result of a run once it has been evaluated.
pub trait ReportCollector: Send + Sync {
    fn finalize(&self, result: &RunResult);
}

/// Choose which reporters a run should use.
///
/// With nothing enabled the resulting [Reporter] discards results.
#[derive(Debug, Default)]
pub struct ReportConfig {
    enable_summary: bool,
    enable_json: bool,
}

impl ReportConfig {
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    pub fn enable_json(mut self) -> Self {
        self.enable_json = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();
        if self.enable_summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }
        if self.enable_json {
            collectors.push(Box::new(JsonReportCollector::new()));
        }

        Reporter { collectors }
    }
}

pub struct Reporter {
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl Reporter {
    pub fn finalize(&self, result: &RunResult) {
        for collector in &self.collectors {
            collector.finalize(result);
        }
    }
}
