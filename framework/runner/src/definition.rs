use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use loadline_core::prelude::ConfigError;
use loadline_http_client::prelude::{HttpClient, ReqwestHttpClient};
use loadline_instruments::{MetricRegistry, ReportConfig, Threshold};

use crate::cli::{parse_target_url, LoadlineScenarioCli, ReporterOpt};
use crate::init::init;
use crate::profile::{RunConfig, Stage};
use crate::workflow::{Workflow, WorkflowPlan};

/// Default wait for in-flight iterations after the deadline
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
/// Upper bound on the drain wait when the run is stopped early
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);
/// Default interval between two ramp scheduler ticks
pub const DEFAULT_CONTROL_INTERVAL: Duration = Duration::from_secs(1);

/// The workflow variable the target URL is exposed as
pub const TARGET_URL_VARIABLE: &str = "base_url";

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run. Values
/// given here are defaults, anything set on the command line takes precedence.
pub struct ScenarioDefinitionBuilder {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: LoadlineScenarioCli,
    default_vus: Option<usize>,
    default_duration: Option<Duration>,
    default_stages: Vec<Stage>,
    default_target_url: Option<String>,
    default_graceful_stop: Duration,
    cancel_grace: Duration,
    control_interval: Duration,
    workflow: Option<Workflow>,
    thresholds: Vec<(String, String)>,
    client: Option<Arc<dyn HttpClient>>,
}

pub(crate) struct ScenarioDefinition {
    pub(crate) name: String,
    pub(crate) run_id: Option<String>,
    pub(crate) profile: RunConfig,
    pub(crate) plan: WorkflowPlan,
    pub(crate) registry: MetricRegistry,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) client: Arc<dyn HttpClient>,
    pub(crate) reporter: ReportConfig,
    pub(crate) no_progress: bool,
    pub(crate) graceful_stop: Duration,
    pub(crate) cancel_grace: Duration,
    pub(crate) control_interval: Duration,
}

impl ScenarioDefinitionBuilder {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: LoadlineScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_vus: None,
            default_duration: None,
            default_stages: Vec::new(),
            default_target_url: None,
            default_graceful_stop: DEFAULT_GRACEFUL_STOP,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            control_interval: DEFAULT_CONTROL_INTERVAL,
            workflow: None,
            thresholds: Vec::new(),
            client: None,
        }
    }

    /// Set up logging, parse the command line and create a builder from it.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// Run this many virtual users at a constant rate unless `--vus` is given.
    pub fn with_default_vus(mut self, vus: usize) -> Self {
        self.default_vus = Some(vus);
        self
    }

    /// Run for this long at a constant rate unless `--duration` is given.
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = Some(duration);
        self
    }

    /// Ramp through these stages unless the command line asks for something else.
    pub fn with_default_stages(mut self, stages: Vec<Stage>) -> Self {
        self.default_stages = stages;
        self
    }

    /// The service to test unless `--target-url` is given. Exposed to the workflow as
    /// `{{base_url}}`.
    pub fn with_default_target_url(mut self, target_url: &str) -> Self {
        self.default_target_url = Some(target_url.to_string());
        self
    }

    pub fn with_default_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.default_graceful_stop = graceful_stop;
        self
    }

    /// Cap on the drain wait after an early stop.
    pub fn with_cancel_grace(mut self, cancel_grace: Duration) -> Self {
        self.cancel_grace = cancel_grace;
        self
    }

    /// How often the scheduler adjusts the number of virtual users.
    pub fn with_control_interval(mut self, control_interval: Duration) -> Self {
        self.control_interval = control_interval;
        self
    }

    /// Add a pass/fail threshold on `metric`, for example `p(95)<500`.
    pub fn with_threshold(mut self, metric: &str, expression: &str) -> Self {
        self.thresholds
            .push((metric.to_string(), expression.to_string()));
        self
    }

    /// Set the workflow every virtual user runs.
    pub fn use_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = Some(workflow);
        self
    }

    /// Send requests through `client` instead of the default reqwest client.
    pub fn use_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> RunConfig {
        if !self.cli.stage.is_empty() {
            return RunConfig::staged(self.cli.stage.clone());
        }

        if self.cli.vus.is_none() && self.cli.duration.is_none() && !self.default_stages.is_empty() {
            return RunConfig::staged(self.default_stages.clone());
        }

        RunConfig::constant(
            self.cli.vus.or(self.default_vus).unwrap_or(1),
            self.cli
                .duration
                .or(self.default_duration)
                .unwrap_or_default(),
        )
    }

    /// Resolve the command line against the defaults and validate everything, so that
    /// configuration problems are reported before any virtual user starts.
    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition> {
        let profile = self.profile();
        profile.validate()?;
        if self.control_interval.is_zero() {
            return Err(ConfigError::ZeroControlInterval.into());
        }

        let mut workflow = self
            .workflow
            .clone()
            .ok_or_else(|| ConfigError::MissingWorkflow {
                scenario: self.name.clone(),
            })?;
        if let Some(target_url) = self.cli.target_url.as_ref().or(self.default_target_url.as_ref())
        {
            workflow.set_variable(TARGET_URL_VARIABLE, &parse_target_url(target_url)?);
        }

        let mut registry = MetricRegistry::with_builtins();
        let plan = workflow.compile(&mut registry)?;

        let thresholds = self
            .thresholds
            .iter()
            .map(|(metric, expression)| -> Result<Threshold, ConfigError> {
                let threshold = Threshold::parse(metric, expression)?;
                threshold.validate(&registry)?;
                Ok(threshold)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let client = match self.client {
            Some(client) => client,
            None => Arc::new(ReqwestHttpClient::new().context("Failed to create the HTTP client")?),
        };

        let reporter = match self.cli.reporter {
            ReporterOpt::Summary => ReportConfig::default().enable_summary(),
            ReporterOpt::Json => ReportConfig::default().enable_json(),
            ReporterOpt::Noop => ReportConfig::default(),
        };

        Ok(ScenarioDefinition {
            name: self.name,
            run_id: self.cli.run_id,
            profile,
            plan,
            registry,
            thresholds,
            client,
            reporter,
            no_progress: self.cli.no_progress,
            graceful_stop: self.cli.graceful_stop.unwrap_or(self.default_graceful_stop),
            cancel_grace: self.cancel_grace,
            control_interval: self.control_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowStep;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> LoadlineScenarioCli {
        LoadlineScenarioCli::parse_from(std::iter::once("scenario").chain(args.iter().copied()))
    }

    fn workflow() -> Workflow {
        Workflow::new("w").with_step(WorkflowStep::get("ping", "{{base_url}}/ping"))
    }

    fn builder(args: &[&str]) -> ScenarioDefinitionBuilder {
        ScenarioDefinitionBuilder::new("scenario", cli(args))
            .with_default_target_url("http://localhost:5000")
            .use_workflow(workflow())
    }

    fn config_error(result: anyhow::Result<ScenarioDefinition>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected a configuration error"),
            Err(e) => e
                .downcast_ref::<ConfigError>()
                .cloned()
                .unwrap_or_else(|| panic!("not a configuration error: {e:?}")),
        }
    }

    #[test]
    fn command_line_overrides_defaults() {
        let definition = builder(&["--vus", "3"])
            .with_default_vus(50)
            .with_default_duration(Duration::from_secs(120))
            .build()
            .unwrap();

        assert_eq!(
            RunConfig::constant(3, Duration::from_secs(120)),
            definition.profile
        );
        assert_eq!(DEFAULT_GRACEFUL_STOP, definition.graceful_stop);
    }

    #[test]
    fn stages_from_command_line_win() {
        let definition = builder(&["--stage", "10s:5", "--vus", "3"])
            .with_default_duration(Duration::from_secs(120))
            .build()
            .unwrap();

        assert_eq!(
            RunConfig::staged(vec![Stage::new(Duration::from_secs(10), 5)]),
            definition.profile
        );
    }

    #[test]
    fn default_stages_unless_constant_requested() {
        let stages = vec![Stage::new(Duration::from_secs(10), 5)];

        let definition = builder(&[])
            .with_default_stages(stages.clone())
            .build()
            .unwrap();
        assert_eq!(RunConfig::staged(stages.clone()), definition.profile);

        let definition = builder(&["--duration", "5s"])
            .with_default_stages(stages)
            .build()
            .unwrap();
        assert_eq!(RunConfig::constant(1, Duration::from_secs(5)), definition.profile);
    }

    #[test]
    fn target_url_becomes_a_variable() {
        let definition = builder(&["--target-url", "http://svc:8080/", "--duration", "1s"])
            .build()
            .unwrap();

        assert_eq!(
            Some(&"http://svc:8080".to_string()),
            definition.plan.variables.get(TARGET_URL_VARIABLE)
        );
    }

    #[test]
    fn missing_duration_is_a_config_error() {
        assert_eq!(ConfigError::ZeroDuration, config_error(builder(&[]).build()));
    }

    #[test]
    fn zero_control_interval_is_a_config_error() {
        let result = builder(&["--duration", "1s"])
            .with_control_interval(Duration::ZERO)
            .build();

        assert_eq!(ConfigError::ZeroControlInterval, config_error(result));
    }

    #[test]
    fn missing_workflow_is_a_config_error() {
        let result = ScenarioDefinitionBuilder::new("empty", cli(&["--duration", "1s"])).build();

        assert_eq!(
            ConfigError::MissingWorkflow {
                scenario: "empty".to_string()
            },
            config_error(result)
        );
    }

    #[test]
    fn thresholds_are_validated() {
        let result = builder(&["--duration", "1s"])
            .with_threshold("http_req_duration", "p(95)<500")
            .with_threshold("failed_requests", "count<100")
            .build();

        assert_eq!(
            ConfigError::UnknownMetric {
                metric: "failed_requests".to_string()
            },
            config_error(result)
        );

        let definition = builder(&["--duration", "1s"])
            .with_threshold("http_req_duration", "p(95)<500")
            .with_threshold("ping", "p(99)<1s")
            .build()
            .unwrap();
        assert_eq!(2, definition.thresholds.len());
    }

    #[test]
    fn malformed_target_url_is_a_config_error() {
        let result = ScenarioDefinitionBuilder::new("bad", cli(&["--duration", "1s"]))
            .with_default_target_url("not a url")
            .use_workflow(workflow())
            .build();

        assert!(matches!(
            config_error(result),
            ConfigError::InvalidTargetUrl { .. }
        ));
    }
}
