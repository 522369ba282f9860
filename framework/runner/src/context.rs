use std::collections::HashMap;
use std::sync::Arc;

use loadline_core::prelude::{ShutdownHandle, StopSignal};

use crate::executor::Executor;
use crate::iteration::WorkflowExecutor;
use crate::workflow::WorkflowPlan;

/// Scratch state for a single iteration of a single virtual user.
///
/// Seeded with the workflow variables, the iteration's generated values and the built-in `vu` and
/// `iter` values. Steps add their captures as they run. Dropped at the end of the iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationContext {
    vu: usize,
    iteration: u64,
    values: HashMap<String, String>,
}

impl IterationContext {
    pub fn new(plan: &WorkflowPlan, vu: usize, iteration: u64) -> Self {
        let mut values = plan.variables.clone().into_iter().collect::<HashMap<_, _>>();
        values.extend(
            plan.generators
                .iter()
                .map(|(name, generator)| (name.clone(), generator.generate())),
        );
        values.insert("vu".to_string(), vu.to_string());
        values.insert("iter".to_string(), iteration.to_string());

        Self {
            vu,
            iteration,
            values,
        }
    }

    pub fn vu(&self) -> usize {
        self.vu
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub(crate) fn insert(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }
}

/// Everything shared by the virtual users of a run.
pub struct RunnerContext {
    executor: Arc<Executor>,
    workflow_executor: WorkflowExecutor,
    plan: WorkflowPlan,
    shutdown_handle: ShutdownHandle,
}

impl RunnerContext {
    pub(crate) fn new(
        executor: Arc<Executor>,
        workflow_executor: WorkflowExecutor,
        plan: WorkflowPlan,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            executor,
            workflow_executor,
            plan,
            shutdown_handle,
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn workflow_executor(&self) -> &WorkflowExecutor {
        &self.workflow_executor
    }

    pub fn plan(&self) -> &WorkflowPlan {
        &self.plan
    }

    pub(crate) fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }
}

/// The state owned by one virtual user loop.
pub struct VuContext {
    vu_id: usize,
    runner_context: Arc<RunnerContext>,
    stop: StopSignal,
    iterations: u64,
}

impl VuContext {
    pub(crate) fn new(vu_id: usize, runner_context: Arc<RunnerContext>, stop: StopSignal) -> Self {
        Self {
            vu_id,
            runner_context,
            stop,
            iterations: 0,
        }
    }

    pub fn vu_id(&self) -> usize {
        self.vu_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }

    pub fn stop_signal(&mut self) -> &mut StopSignal {
        &mut self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// A fresh context for the next iteration of this virtual user.
    pub(crate) fn next_iteration(&mut self) -> IterationContext {
        let context = IterationContext::new(self.runner_context.plan(), self.vu_id, self.iterations);
        self.iterations += 1;
        context
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
