use std::time::Duration;

/// A problem with the run definition. These are reported before any virtual user is started and
/// the run does not go ahead.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[display("run profile has no stages")]
    EmptyProfile,
    #[display("run profile has a total duration of zero")]
    ZeroDuration,
    #[display("the scheduler control interval must be positive")]
    ZeroControlInterval,
    #[display("invalid duration `{value}`")]
    InvalidDuration { value: String },
    #[display("invalid stage `{value}`, expected `<duration>:<target>`")]
    InvalidStage { value: String },
    #[display("invalid target url `{value}`: {reason}")]
    InvalidTargetUrl { value: String, reason: String },
    #[display("scenario `{scenario}` has no workflow")]
    MissingWorkflow { scenario: String },
    #[display("workflow `{workflow}` has no steps")]
    EmptyWorkflow { workflow: String },
    #[display("workflow `{workflow}` is invalid: {reason}")]
    InvalidWorkflow { workflow: String, reason: String },
    #[display("step name `{name}` is used more than once")]
    DuplicateStep { name: String },
    #[display("step `{step}` is invalid: {reason}")]
    InvalidStep { step: String, reason: String },
    #[display("invalid template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[display("step `{step}` uses `{{{{{variable}}}}}` which is not a variable, generator or earlier capture")]
    UnknownVariable { step: String, variable: String },
    #[display("step `{step}` requires `{capture}` which is not captured by an earlier step")]
    UnknownRequirement { step: String, capture: String },
    #[display("invalid threshold `{expression}` on `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },
    #[display("threshold references unknown metric `{metric}`")]
    UnknownMetric { metric: String },
}

/// An internal invariant of the ramp scheduler was broken. This aborts the run.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[display("computed an invalid target of {value} virtual users at {elapsed:?}")]
    InvalidTarget { value: f64, elapsed: Duration },
    #[display("failed to start virtual user {vu}: {reason}")]
    Spawn { vu: usize, reason: String },
}
