use std::time::Duration;

use clap::{Parser, ValueEnum};
use loadline_core::prelude::{parse_duration, ConfigError};

use crate::profile::Stage;

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct LoadlineScenarioCli {
    /// Base URL of the service to test, for example `http://localhost:5000`
    #[clap(short, long, value_parser = parse_target_url)]
    pub target_url: Option<String>,

    /// The number of virtual users to run at a constant rate
    #[clap(long)]
    pub vus: Option<usize>,

    /// How long to run at a constant rate, for example `30s` or `2m`
    #[clap(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Ramp the number of virtual users through stages instead of running at a constant rate.
    /// Each stage is given as `duration:target`, for example `--stage=2m:100`.
    ///
    /// The flag can be repeated, stages run in the order given. When any stage is given, `--vus`
    /// and `--duration` are ignored.
    #[clap(long, value_parser = Stage::parse)]
    pub stage: Vec<Stage>,

    /// How long to wait for in-flight iterations to finish once the run deadline has passed
    #[clap(long, value_parser = parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Where to report the result of the run
    #[clap(long, value_enum, default_value_t = ReporterOpt::Summary)]
    pub reporter: ReporterOpt,

    /// Use this id for the run instead of generating one
    #[clap(long)]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Print summary tables to stdout
    #[default]
    Summary,
    /// Print the run result as a single line of JSON to stdout
    Json,
    /// Do not report anything
    Noop,
}

/// Check that `value` is an absolute URL and drop any trailing `/` so that it can be joined with
/// paths in templates.
pub(crate) fn parse_target_url(value: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(value).map_err(|e| ConfigError::InvalidTargetUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidTargetUrl {
            value: value.to_string(),
            reason: "not a base url".to_string(),
        });
    }

    Ok(value.trim_end_matches('/').to_string())
}
