use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use loadline_core::prelude::ShutdownHandle;
use loadline_instruments::{MetricsCollector, VUS};
use loadline_summary_model::RunResult;

use crate::context::RunnerContext;
use crate::definition::{ScenarioDefinition, ScenarioDefinitionBuilder};
use crate::executor::Executor;
use crate::iteration::WorkflowExecutor;
use crate::progress::start_progress;
use crate::scheduler::RampScheduler;
use crate::shutdown::start_shutdown_listener;

/// Stops a run early from outside, for example from another thread.
///
/// Virtual users finish their current iteration and the drain wait is shortened. The run still
/// produces a result.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shutdown_handle: ShutdownHandle,
}

impl StopHandle {
    pub fn stop(&self) {
        log::info!("Stop requested");
        self.shutdown_handle.shutdown();
    }
}

/// Owns a validated scenario from start to result.
pub struct RunController {
    definition: ScenarioDefinition,
    shutdown_handle: ShutdownHandle,
}

impl RunController {
    /// Validate the scenario. Configuration errors are returned here, before anything runs.
    pub fn new(definition: ScenarioDefinitionBuilder) -> anyhow::Result<Self> {
        let definition = definition.build()?;

        Ok(Self {
            definition,
            shutdown_handle: ShutdownHandle::new(),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown_handle: self.shutdown_handle.clone(),
        }
    }

    /// Run the scenario to completion and report the result.
    ///
    /// Blocks until the profile has elapsed, or a stop was requested, and the virtual users have
    /// drained. Only a scheduler failure makes this return an error.
    pub fn run(self) -> anyhow::Result<RunResult> {
        let Self {
            definition,
            shutdown_handle,
        } = self;

        let run_id = definition
            .run_id
            .clone()
            .unwrap_or_else(|| nanoid::nanoid!());
        let started_at = chrono::Utc::now();
        let planned = definition.profile.total_duration();

        log::info!(
            "Running scenario: {} (run id {run_id}, {planned:?}, up to {} virtual users)",
            definition.name,
            definition.profile.peak_target()
        );

        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        start_shutdown_listener(&runtime, shutdown_handle.clone());
        let executor = Arc::new(Executor::new(runtime));

        let collector = Arc::new(MetricsCollector::new(definition.registry.clone()));
        let runner_context = Arc::new(RunnerContext::new(
            executor.clone(),
            WorkflowExecutor::new(definition.client.clone(), collector.clone()),
            definition.plan.clone(),
            shutdown_handle.clone(),
        ));
        let reporter = definition.reporter.init();

        let live_vus = Arc::new(AtomicUsize::new(0));
        if !definition.no_progress {
            start_progress(planned, live_vus.clone(), shutdown_handle.new_listener())?;
        }

        let mut scheduler = RampScheduler::new(definition.profile.clone(), runner_context);
        let mut listener = shutdown_handle.new_listener();
        let start = Instant::now();
        let mut scheduler_error = None;
        loop {
            let elapsed = start.elapsed();
            if elapsed >= planned || shutdown_handle.is_shutdown() {
                break;
            }

            match scheduler.tick(elapsed) {
                Ok(live) => {
                    collector.record(VUS, live as f64);
                    live_vus.store(live, Ordering::Relaxed);
                }
                Err(e) => {
                    log::error!("Scheduler failed, stopping the run: {e}");
                    scheduler_error = Some(e);
                    break;
                }
            }

            let remaining = planned.saturating_sub(start.elapsed());
            executor.sleep_or_shutdown(definition.control_interval.min(remaining), &mut listener);
        }

        let stopped_early = shutdown_handle.is_shutdown() || scheduler_error.is_some();
        let grace = if stopped_early {
            definition.graceful_stop.min(definition.cancel_grace)
        } else {
            definition.graceful_stop
        };
        log::info!(
            "{}, waiting up to {grace:?} for virtual users to finish their iterations",
            if stopped_early {
                "Run stopped early"
            } else {
                "Run deadline reached"
            }
        );

        shutdown_handle.shutdown();
        let undrained_vus = scheduler.drain(grace);
        collector.freeze();

        let snapshot = collector.snapshot();
        let outcomes = collector.evaluate(&definition.thresholds);

        let mut result = RunResult::new(
            run_id,
            definition.name.clone(),
            started_at.timestamp(),
            planned.as_secs_f64(),
            snapshot.summarize(),
            snapshot.counters.clone(),
            outcomes,
        );
        result.set_elapsed_s(start.elapsed().as_secs_f64());
        result.set_undrained_vus(undrained_vus);

        if let Some(e) = scheduler_error {
            return Err(e.into());
        }

        reporter.finalize(&result);
        log::info!(
            "Scenario {} {}",
            definition.name,
            if result.passed { "passed" } else { "failed" }
        );

        Ok(result)
    }
}

/// Validate and run a scenario in one call.
pub fn run(definition: ScenarioDefinitionBuilder) -> anyhow::Result<RunResult> {
    RunController::new(definition)?.run()
}
