mod check;
mod generator;
mod template;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use loadline_core::prelude::ConfigError;
use loadline_http_client::prelude::Method;
use loadline_instruments::MetricRegistry;

pub use check::{Capture, Check, CheckPredicate};
pub use generator::{ThinkTime, ValueGenerator};
pub use template::Template;

/// Per-call timeout used when a step does not set one
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);

/// Variables every iteration context provides without being declared
pub const BUILTIN_VARIABLES: [&str; 2] = ["vu", "iter"];

/// The definition of one HTTP call in a workflow.
///
/// Fields hold the raw text of templates. They are parsed and checked when the workflow is
/// compiled, before the run starts.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    name: String,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    checks: Vec<Check>,
    captures: Vec<Capture>,
    requires: Vec<String>,
    required_for_continuation: bool,
    think_time: Option<ThinkTime>,
    timeout: Duration,
    parallel: usize,
    generators: BTreeMap<String, ValueGenerator>,
}

impl WorkflowStep {
    /// A step named `name` calling `url`. The name is also the metric the step's latency is
    /// recorded under.
    pub fn new(name: &str, method: Method, url: &str) -> Self {
        Self {
            name: name.to_string(),
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            checks: Vec::new(),
            captures: Vec::new(),
            requires: Vec::new(),
            required_for_continuation: false,
            think_time: None,
            timeout: DEFAULT_STEP_TIMEOUT,
            parallel: 1,
            generators: BTreeMap::new(),
        }
    }

    pub fn get(name: &str, url: &str) -> Self {
        Self::new(name, Method::GET, url)
    }

    pub fn post(name: &str, url: &str) -> Self {
        Self::new(name, Method::POST, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set a JSON body template and the matching content type.
    pub fn with_json_body(self, body: &str) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(body)
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Store the value at `path` in the JSON response body as `name` for later steps.
    pub fn capture(mut self, name: &str, path: &str) -> Self {
        self.captures.push(Capture::new(name, path));
        self
    }

    /// Only run this step if `capture` was stored by an earlier step in the same iteration.
    pub fn requires(mut self, capture: &str) -> Self {
        self.requires.push(capture.to_string());
        self
    }

    /// If any check on this step fails, its captures are not stored so dependent steps are
    /// skipped.
    pub fn required_for_continuation(mut self) -> Self {
        self.required_for_continuation = true;
        self
    }

    pub fn with_think_time(mut self, think_time: impl Into<ThinkTime>) -> Self {
        self.think_time = Some(think_time.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issue `copies` identical calls concurrently and wait for all of them.
    pub fn with_parallel(mut self, copies: usize) -> Self {
        self.parallel = copies;
        self
    }

    /// A value generated afresh for every call this step makes.
    pub fn with_generator(mut self, name: &str, generator: ValueGenerator) -> Self {
        self.generators.insert(name.to_string(), generator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered list of steps run by every virtual user, once per iteration.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    variables: BTreeMap<String, String>,
    generators: BTreeMap<String, ValueGenerator>,
    failure_counter: Option<String>,
    steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: BTreeMap::new(),
            generators: BTreeMap::new(),
            failure_counter: None,
            steps: Vec::new(),
        }
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    /// A value generated once at the start of every iteration.
    pub fn with_generator(mut self, name: &str, generator: ValueGenerator) -> Self {
        self.generators.insert(name.to_string(), generator);
        self
    }

    /// Count every call where at least one check failed under `metric`.
    pub fn with_failure_counter(mut self, metric: &str) -> Self {
        self.failure_counter = Some(metric.to_string());
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_variable(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    /// Check the workflow and turn it into a [WorkflowPlan].
    ///
    /// Every metric the plan will record is added to `registry` so that thresholds can be
    /// validated against it.
    pub fn compile(&self, registry: &mut MetricRegistry) -> Result<WorkflowPlan, ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::EmptyWorkflow {
                workflow: self.name.clone(),
            });
        }

        for name in self.variables.keys().chain(self.generators.keys()) {
            if BUILTIN_VARIABLES.contains(&name.as_str()) {
                return Err(invalid_workflow(
                    self,
                    format!("`{name}` is a built-in variable"),
                ));
            }
        }
        if let Some(name) = self.generators.keys().find(|g| self.variables.contains_key(*g)) {
            return Err(invalid_workflow(
                self,
                format!("generator `{name}` shadows a variable"),
            ));
        }

        for (name, generator) in &self.generators {
            generator.validate().map_err(|reason| ConfigError::InvalidStep {
                step: format!("{}.{name}", self.name),
                reason,
            })?;
        }

        let mut known: HashSet<&str> = BUILTIN_VARIABLES.into_iter().collect();
        known.extend(self.variables.keys().map(String::as_str));
        known.extend(self.generators.keys().map(String::as_str));

        let mut step_names = HashSet::new();
        let mut captured: HashMap<&str, &str> = HashMap::new();
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if !step_names.insert(step.name.as_str()) {
                return Err(ConfigError::DuplicateStep {
                    name: step.name.clone(),
                });
            }
            if registry.kind(&step.name).is_some() {
                return Err(invalid_step(step, "name clashes with a built-in metric"));
            }

            steps.push(compile_step(step, &known, &captured)?);

            for capture in &step.captures {
                if known.contains(capture.name.as_str()) {
                    return Err(invalid_step(
                        step,
                        &format!("capture `{}` shadows a variable", capture.name),
                    ));
                }
                if let Some(other) = captured.insert(&capture.name, &step.name) {
                    return Err(invalid_step(
                        step,
                        &format!("`{}` is already captured by `{other}`", capture.name),
                    ));
                }
            }
        }

        if let Some(counter) = &self.failure_counter {
            let clash = if registry.kind(counter).is_some() {
                Some("a built-in metric")
            } else if step_names.contains(counter.as_str()) {
                Some("a step name")
            } else {
                None
            };
            if let Some(clash) = clash {
                return Err(invalid_workflow(
                    self,
                    format!("failure counter `{counter}` clashes with {clash}"),
                ));
            }
        }

        for step in &steps {
            registry.register_trend(&step.name);
        }
        if let Some(counter) = &self.failure_counter {
            registry.register_counter(counter);
        }

        Ok(WorkflowPlan {
            name: self.name.clone(),
            variables: self.variables.clone(),
            generators: self.generators.clone(),
            failure_counter: self.failure_counter.clone(),
            steps,
        })
    }
}

fn invalid_workflow(workflow: &Workflow, reason: String) -> ConfigError {
    ConfigError::InvalidWorkflow {
        workflow: workflow.name.clone(),
        reason,
    }
}

fn invalid_step(step: &WorkflowStep, reason: &str) -> ConfigError {
    ConfigError::InvalidStep {
        step: step.name.clone(),
        reason: reason.to_string(),
    }
}

fn compile_step(
    step: &WorkflowStep,
    known: &HashSet<&str>,
    captured: &HashMap<&str, &str>,
) -> Result<StepPlan, ConfigError> {
    if step.name.trim().is_empty() {
        return Err(invalid_step(step, "name is empty"));
    }
    if step.parallel == 0 {
        return Err(invalid_step(step, "parallel must be at least 1"));
    }
    if step.parallel > 1 && !step.captures.is_empty() {
        return Err(invalid_step(step, "a parallel step cannot capture values"));
    }
    if step.timeout.is_zero() {
        return Err(invalid_step(step, "timeout must be positive"));
    }
    if let Some(think_time) = &step.think_time {
        think_time
            .validate()
            .map_err(|reason| invalid_step(step, &reason))?;
    }
    for generator in step.generators.values() {
        generator
            .validate()
            .map_err(|reason| invalid_step(step, &reason))?;
    }

    let url = Template::parse(&step.url)?;
    let headers = step
        .headers
        .iter()
        .map(|(name, value)| Template::parse(value).map(|value| (name.clone(), value)))
        .collect::<Result<Vec<_>, ConfigError>>()?;
    let body = step.body.as_deref().map(Template::parse).transpose()?;

    let mut requires = Vec::new();
    for capture in &step.requires {
        if !captured.contains_key(capture.as_str()) {
            return Err(ConfigError::UnknownRequirement {
                step: step.name.clone(),
                capture: capture.clone(),
            });
        }
        if !requires.contains(capture) {
            requires.push(capture.clone());
        }
    }

    let templates = std::iter::once(&url)
        .chain(headers.iter().map(|(_, value)| value))
        .chain(body.iter());
    for variable in templates.flat_map(Template::variables) {
        if step.generators.contains_key(variable) || known.contains(variable) {
            continue;
        }
        if !captured.contains_key(variable) {
            return Err(ConfigError::UnknownVariable {
                step: step.name.clone(),
                variable: variable.to_string(),
            });
        }
        if !requires.iter().any(|r| r == variable) {
            requires.push(variable.to_string());
        }
    }

    Ok(StepPlan {
        name: step.name.clone(),
        method: step.method.clone(),
        url,
        headers,
        body,
        checks: step.checks.clone(),
        captures: step.captures.clone(),
        requires,
        required_for_continuation: step.required_for_continuation,
        think_time: step.think_time,
        timeout: step.timeout,
        parallel: step.parallel,
        generators: step.generators.clone(),
    })
}

/// A validated workflow, ready to be executed.
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    pub(crate) name: String,
    pub(crate) variables: BTreeMap<String, String>,
    pub(crate) generators: BTreeMap<String, ValueGenerator>,
    pub(crate) failure_counter: Option<String>,
    pub(crate) steps: Vec<StepPlan>,
}

impl WorkflowPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepPlan] {
        &self.steps
    }

    pub fn failure_counter(&self) -> Option<&str> {
        self.failure_counter.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct StepPlan {
    pub(crate) name: String,
    pub(crate) method: Method,
    pub(crate) url: Template,
    pub(crate) headers: Vec<(String, Template)>,
    pub(crate) body: Option<Template>,
    pub(crate) checks: Vec<Check>,
    pub(crate) captures: Vec<Capture>,
    /// Explicit requirements plus any earlier capture a template refers to
    pub(crate) requires: Vec<String>,
    pub(crate) required_for_continuation: bool,
    pub(crate) think_time: Option<ThinkTime>,
    pub(crate) timeout: Duration,
    pub(crate) parallel: usize,
    pub(crate) generators: BTreeMap<String, ValueGenerator>,
}

impl StepPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadline_instruments::MetricKind;
    use pretty_assertions::assert_eq;

    fn auth_workflow() -> Workflow {
        Workflow::new("auth")
            .with_variable("base_url", "http://localhost:5000")
            .with_generator("username", ValueGenerator::unique("perfuser_"))
            .with_failure_counter("failed_requests")
            .with_step(
                WorkflowStep::post("register", "{{base_url}}/register")
                    .with_json_body(r#"{"username":"{{username}}","password":"test123"}"#),
            )
            .with_step(
                WorkflowStep::post("login", "{{base_url}}/login")
                    .with_json_body(r#"{"username":"{{username}}","password":"test123"}"#)
                    .capture("token", "token"),
            )
            .with_step(
                WorkflowStep::get("protected", "{{base_url}}/protected")
                    .with_header("Authorization", "{{token}}"),
            )
    }

    #[test]
    fn compile_registers_metrics_and_implicit_requirements() {
        let mut registry = MetricRegistry::with_builtins();
        let plan = auth_workflow().compile(&mut registry).unwrap();

        assert_eq!(3, plan.steps().len());
        assert!(plan.steps()[0].requires().is_empty());
        assert_eq!(vec!["token".to_string()], plan.steps()[2].requires());
        assert_eq!(Some(MetricKind::Trend), registry.kind("login"));
        assert_eq!(Some(MetricKind::Counter), registry.kind("failed_requests"));
        assert_eq!(Some("failed_requests"), plan.failure_counter());
    }

    #[test]
    fn empty_workflow_is_rejected() {
        assert_eq!(
            Err(ConfigError::EmptyWorkflow {
                workflow: "nothing".to_string()
            }),
            Workflow::new("nothing")
                .compile(&mut MetricRegistry::new())
                .map(|_| ())
        );
    }

    #[test]
    fn duplicate_step_is_rejected() {
        let workflow = Workflow::new("dup")
            .with_step(WorkflowStep::get("a", "http://x"))
            .with_step(WorkflowStep::get("a", "http://y"));

        assert_eq!(
            Err(ConfigError::DuplicateStep {
                name: "a".to_string()
            }),
            workflow.compile(&mut MetricRegistry::new()).map(|_| ())
        );
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let workflow =
            Workflow::new("w").with_step(WorkflowStep::get("a", "{{base_url}}/protected"));

        assert_eq!(
            Err(ConfigError::UnknownVariable {
                step: "a".to_string(),
                variable: "base_url".to_string()
            }),
            workflow.compile(&mut MetricRegistry::new()).map(|_| ())
        );
    }

    #[test]
    fn capture_must_come_from_an_earlier_step() {
        let workflow = Workflow::new("w")
            .with_step(WorkflowStep::get("protected", "http://x").requires("token"))
            .with_step(WorkflowStep::post("login", "http://x").capture("token", "token"));

        assert_eq!(
            Err(ConfigError::UnknownRequirement {
                step: "protected".to_string(),
                capture: "token".to_string()
            }),
            workflow.compile(&mut MetricRegistry::new()).map(|_| ())
        );
    }

    #[test]
    fn invalid_step_settings() {
        let cases = [
            WorkflowStep::get("a", "http://x").with_parallel(0),
            WorkflowStep::get("a", "http://x")
                .with_parallel(5)
                .capture("token", "token"),
            WorkflowStep::get("a", "http://x").with_timeout(Duration::ZERO),
            WorkflowStep::get("a", "http://x").with_think_time(ThinkTime::Uniform {
                min: Duration::from_secs(2),
                max: Duration::from_secs(1),
            }),
            WorkflowStep::get("a", "http://x").capture("vu", "id"),
            WorkflowStep::get("http_reqs", "http://x"),
        ];

        for step in cases {
            let mut registry = MetricRegistry::with_builtins();
            let result = Workflow::new("w").with_step(step.clone()).compile(&mut registry);
            assert!(
                matches!(result, Err(ConfigError::InvalidStep { .. })),
                "expected {step:?} to be rejected"
            );
        }
    }

    #[test]
    fn failure_counter_must_not_clash_with_other_metrics() {
        for counter in ["http_reqs", "checks_failed", "login"] {
            let mut registry = MetricRegistry::with_builtins();
            let result = Workflow::new("w")
                .with_failure_counter(counter)
                .with_step(WorkflowStep::get("login", "http://x/login"))
                .compile(&mut registry);

            assert!(
                matches!(result, Err(ConfigError::InvalidWorkflow { .. })),
                "expected failure counter `{counter}` to be rejected"
            );
            assert_eq!(None, registry.kind("login"));
        }
    }

    #[test]
    fn builtin_variables_cannot_be_redefined() {
        let cases = [
            Workflow::new("w").with_variable("vu", "7"),
            Workflow::new("w").with_generator("iter", ValueGenerator::unique("i")),
            Workflow::new("w")
                .with_variable("username", "fixed")
                .with_generator("username", ValueGenerator::unique("u")),
        ];

        for workflow in cases {
            let result = workflow
                .with_step(WorkflowStep::get("a", "http://x"))
                .compile(&mut MetricRegistry::new());
            assert!(
                matches!(result, Err(ConfigError::InvalidWorkflow { .. })),
                "expected {result:?} to be an invalid workflow"
            );
        }
    }

    #[test]
    fn step_generators_and_builtins_are_known() {
        let workflow = Workflow::new("w").with_step(
            WorkflowStep::post("bulk", "http://x/register?vu={{vu}}&iter={{iter}}")
                .with_generator("bulk_user", ValueGenerator::random("bulk_user_"))
                .with_json_body(r#"{"username":"{{bulk_user}}"}"#)
                .with_parallel(5),
        );

        let plan = workflow.compile(&mut MetricRegistry::new()).unwrap();
        assert!(plan.steps()[0].requires().is_empty());
    }
}
