use std::io::Write;

use loadline_summary_model::{store_run_result, RunResult};

use crate::report::ReportCollector;

/// Writes the run result to stdout as a single line of JSON, for other tools to consume.
#[derive(Debug, Default)]
pub struct JsonReportCollector;

impl JsonReportCollector {
    pub fn new() -> Self {
        Self
    }
}

impl ReportCollector for JsonReportCollector {
    fn finalize(&self, result: &RunResult) {
        let mut stdout = std::io::stdout().lock();
        let written = store_run_result(result, &mut stdout)
            .and_then(|_| writeln!(stdout).map_err(anyhow::Error::from));
        if let Err(e) = written {
            log::error!("Failed to write run result as JSON: {:?}", e);
        }
    }
}
