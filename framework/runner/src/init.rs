use crate::cli::LoadlineScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the loadline runner.
pub fn init() -> LoadlineScenarioCli {
    env_logger::init();

    LoadlineScenarioCli::parse()
}
