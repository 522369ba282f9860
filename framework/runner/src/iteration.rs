use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use loadline_core::prelude::StopSignal;
use loadline_http_client::prelude::{HttpClient, HttpRequest, HttpResponse, RequestError};
use loadline_instruments::{
    MetricsCollector, CHECKS_FAILED, CHECKS_PASSED, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
    HTTP_REQ_TIMEOUTS, ITERATIONS, ITERATION_DURATION,
};
use serde_json::Value;

use crate::context::IterationContext;
use crate::workflow::{StepPlan, WorkflowPlan};

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// HTTP calls issued, counting each copy of a parallel step
    pub calls: usize,
    /// Calls where at least one check failed or the request itself failed
    pub failed_calls: usize,
    /// Steps not run because something they required was not captured
    pub skipped_steps: usize,
}

/// The outcome of one HTTP call, after it has been recorded.
struct CallOutcome {
    response: Option<HttpResponse>,
    body: Option<Value>,
    any_check_failed: bool,
    transport_failed: bool,
}

/// Runs workflow iterations and records what happened to the metrics collector.
///
/// The HTTP client and the collector are shared by every virtual user.
#[derive(Clone)]
pub struct WorkflowExecutor {
    client: Arc<dyn HttpClient>,
    collector: Arc<MetricsCollector>,
}

impl WorkflowExecutor {
    pub fn new(client: Arc<dyn HttpClient>, collector: Arc<MetricsCollector>) -> Self {
        Self { client, collector }
    }

    /// Run every step of `plan` in order.
    ///
    /// Request and check failures are counted and never returned. A stop request cuts think time
    /// short but the remaining steps still run, so an iteration always completes.
    pub async fn run_iteration(
        &self,
        plan: &WorkflowPlan,
        mut context: IterationContext,
        stop: &mut StopSignal,
    ) -> IterationReport {
        let started = Instant::now();
        let mut report = IterationReport::default();

        for step in &plan.steps {
            if let Some(missing) = step.requires.iter().find(|r| !context.contains(r)) {
                log::debug!(
                    "Skipping step {} for vu {} iteration {}, `{missing}` was not captured",
                    step.name,
                    context.vu(),
                    context.iteration()
                );
                report.skipped_steps += 1;
            } else {
                self.run_step(plan, step, &mut context, &mut report).await;
            }

            if let Some(think_time) = &step.think_time {
                stop.pause(think_time.sample()).await;
            }
        }

        self.collector.increment_counter(ITERATIONS);
        self.collector
            .record(ITERATION_DURATION, started.elapsed().as_micros() as f64 / 1000.0);

        report
    }

    async fn run_step(
        &self,
        plan: &WorkflowPlan,
        step: &StepPlan,
        context: &mut IterationContext,
        report: &mut IterationReport,
    ) {
        let outcomes = {
            let context = &*context;
            join_all((0..step.parallel).map(|_| self.call(plan, step, context))).await
        };

        let mut gate_failed = false;
        for outcome in &outcomes {
            report.calls += 1;
            if outcome.any_check_failed || outcome.transport_failed {
                report.failed_calls += 1;
            }
            gate_failed |= outcome.any_check_failed;
        }

        if step.captures.is_empty() {
            return;
        }
        if step.required_for_continuation && gate_failed {
            log::debug!(
                "Step {} failed its checks for vu {} iteration {}, not storing captures",
                step.name,
                context.vu(),
                context.iteration()
            );
            return;
        }

        // Parallel steps cannot capture, so there is exactly one outcome here
        let Some(outcome) = outcomes.first() else {
            return;
        };
        let Some(body) = &outcome.body else {
            return;
        };
        for capture in &step.captures {
            match capture.extract(body) {
                Some(value) => context.insert(&capture.name, value),
                None => log::debug!(
                    "Step {} response has nothing at `{}` for capture `{}`",
                    step.name,
                    capture.path,
                    capture.name
                ),
            }
        }
    }

    async fn call(
        &self,
        plan: &WorkflowPlan,
        step: &StepPlan,
        context: &IterationContext,
    ) -> CallOutcome {
        let locals = step
            .generators
            .iter()
            .map(|(name, generator)| (name.clone(), generator.generate()))
            .collect::<HashMap<_, _>>();

        let request = match build_request(step, &locals, context) {
            Ok(request) => request,
            Err(variable) => {
                // Compilation guarantees every placeholder is resolvable once requirements are met
                log::warn!(
                    "Step {} could not resolve `{variable}`, not sending the request",
                    step.name
                );
                return CallOutcome {
                    response: None,
                    body: None,
                    any_check_failed: false,
                    transport_failed: false,
                };
            }
        };

        let started = Instant::now();
        let result = match tokio::time::timeout(step.timeout, self.client.send(request, step.timeout))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout {
                after: step.timeout,
            }),
        };
        let elapsed = started.elapsed();

        self.collector.increment_counter(HTTP_REQS);
        let latency_ms = match &result {
            Ok(response) => response.latency_ms(),
            Err(_) => elapsed.as_micros() as f64 / 1000.0,
        };
        self.collector.record(&step.name, latency_ms);
        self.collector.record(HTTP_REQ_DURATION, latency_ms);

        let outcome = match result {
            Ok(response) => {
                let body = response.json();
                let mut any_check_failed = false;
                for check in &step.checks {
                    if check.evaluate(&response, body.as_ref()) {
                        self.collector.increment_counter(CHECKS_PASSED);
                    } else {
                        log::debug!("Check `{}` failed on step {}", check.name(), step.name);
                        self.collector.increment_counter(CHECKS_FAILED);
                        any_check_failed = true;
                    }
                }

                CallOutcome {
                    response: Some(response),
                    body,
                    any_check_failed,
                    transport_failed: false,
                }
            }
            Err(e) => {
                log::debug!("Request for step {} failed: {e}", step.name);
                self.collector.increment_counter(HTTP_REQ_FAILED);
                if e.is_timeout() {
                    self.collector.increment_counter(HTTP_REQ_TIMEOUTS);
                }
                self.collector
                    .add_to_counter(CHECKS_FAILED, step.checks.len() as u64);

                CallOutcome {
                    response: None,
                    body: None,
                    any_check_failed: !step.checks.is_empty(),
                    transport_failed: true,
                }
            }
        };

        if outcome.any_check_failed {
            if let Some(counter) = &plan.failure_counter {
                self.collector.increment_counter(counter);
            }
        }

        if let Some(response) = &outcome.response {
            log::trace!(
                "Step {} for vu {} returned {} in {latency_ms:.1}ms",
                step.name,
                context.vu(),
                response.status
            );
        }

        outcome
    }
}

fn build_request(
    step: &StepPlan,
    locals: &HashMap<String, String>,
    context: &IterationContext,
) -> Result<HttpRequest, String> {
    let lookup = |name: &str| {
        locals
            .get(name)
            .map(String::as_str)
            .or_else(|| context.get(name))
    };

    let mut request = HttpRequest::new(step.method.clone(), step.url.render(lookup)?);
    for (name, value) in &step.headers {
        request = request.with_header(name.as_str(), value.render(lookup)?);
    }
    if let Some(body) = &step.body {
        request = request.with_body(body.render(lookup)?);
    }

    Ok(request)
}
