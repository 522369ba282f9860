mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod iteration;
mod profile;
mod progress;
mod run;
mod scheduler;
mod shutdown;
mod types;
mod workflow;

pub mod prelude {
    pub use crate::cli::{LoadlineScenarioCli, ReporterOpt};
    pub use crate::context::{IterationContext, RunnerContext, VuContext};
    pub use crate::definition::{
        ScenarioDefinitionBuilder, DEFAULT_CANCEL_GRACE, DEFAULT_CONTROL_INTERVAL,
        DEFAULT_GRACEFUL_STOP, TARGET_URL_VARIABLE,
    };
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::iteration::{IterationReport, WorkflowExecutor};
    pub use crate::profile::{RunConfig, Stage};
    pub use crate::run::{run, RunController, StopHandle};
    pub use crate::types::LoadlineResult;
    pub use crate::workflow::{
        Capture, Check, CheckPredicate, StepPlan, Template, ThinkTime, ValueGenerator, Workflow,
        WorkflowPlan, WorkflowStep, BUILTIN_VARIABLES, DEFAULT_STEP_TIMEOUT,
    };

    // Re-exported so that scenarios only need to depend on the runner
    pub use loadline_core::prelude::{ConfigError, SchedulerError};
    pub use loadline_http_client::prelude::{
        HttpClient, HttpRequest, HttpResponse, Method, RequestError,
    };
    pub use loadline_instruments::{
        CHECKS_FAILED, CHECKS_PASSED, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
        HTTP_REQ_TIMEOUTS, ITERATIONS, ITERATION_DURATION, VUS,
    };
    pub use loadline_summary_model::RunResult;
}
