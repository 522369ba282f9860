use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use loadline_core::prelude::{SchedulerError, ShutdownHandle, StopSignal};

use crate::context::{RunnerContext, VuContext};
use crate::profile::RunConfig;

/// How often [RampScheduler::drain] checks whether loops have finished
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct VuHandle {
    id: usize,
    retire: ShutdownHandle,
    thread: JoinHandle<()>,
}

impl VuHandle {
    fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    fn join(self) {
        if self.thread.join().is_err() {
            log::error!("Virtual user {} panicked", self.id);
        }
    }
}

/// Keeps the number of running virtual user loops in line with the run profile.
///
/// Every call to [RampScheduler::tick] computes the target for the elapsed time and starts or
/// retires loops to meet it. Retired loops finish their current iteration before exiting, newest
/// first.
pub(crate) struct RampScheduler {
    profile: RunConfig,
    context: Arc<RunnerContext>,
    active: Vec<VuHandle>,
    retiring: Vec<VuHandle>,
    next_vu_id: usize,
}

impl RampScheduler {
    pub(crate) fn new(profile: RunConfig, context: Arc<RunnerContext>) -> Self {
        Self {
            profile,
            context,
            active: Vec::new(),
            retiring: Vec::new(),
            next_vu_id: 0,
        }
    }

    /// Bring the number of active loops in line with the target for `elapsed`.
    ///
    /// Returns the number of live loops afterwards, which includes retired loops that have not
    /// finished their last iteration yet.
    pub(crate) fn tick(&mut self, elapsed: Duration) -> Result<usize, SchedulerError> {
        let target = self.profile.target_at(elapsed)?;
        self.reap();

        let current = self.active.len();
        if target > current {
            log::debug!("Starting {} virtual users, target is {target}", target - current);
            for _ in current..target {
                self.spawn_vu()?;
            }
        } else if target < current {
            log::debug!("Retiring {} virtual users, target is {target}", current - target);
            for _ in target..current {
                if let Some(vu) = self.active.pop() {
                    vu.retire.shutdown();
                    self.retiring.push(vu);
                }
            }
        }

        Ok(self.live())
    }

    /// Number of loops whose thread is still running.
    pub(crate) fn live(&self) -> usize {
        self.active
            .iter()
            .chain(self.retiring.iter())
            .filter(|vu| !vu.is_finished())
            .count()
    }

    /// Wait up to `timeout` for every loop to exit. Loops are expected to have been told to stop.
    ///
    /// Returns the number of loops still running when the timeout ran out. Those threads are
    /// detached.
    pub(crate) fn drain(mut self, timeout: Duration) -> usize {
        // A timeout too large to represent waits until every loop has exited
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.reap();
            if self.active.is_empty() && self.retiring.is_empty() {
                return 0;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }

        let undrained = self.active.len() + self.retiring.len();
        log::warn!(
            "{undrained} virtual users did not finish within {timeout:?}, their iterations will not be counted"
        );

        undrained
    }

    fn reap(&mut self) {
        for list in [&mut self.active, &mut self.retiring] {
            let (finished, running): (Vec<_>, Vec<_>) =
                list.drain(..).partition(VuHandle::is_finished);
            *list = running;
            for vu in finished {
                log::trace!("Virtual user {} has exited", vu.id);
                vu.join();
            }
        }
    }

    fn spawn_vu(&mut self) -> Result<(), SchedulerError> {
        let id = self.next_vu_id;
        self.next_vu_id += 1;

        let retire = ShutdownHandle::new();
        let stop = StopSignal::new(self.context.shutdown_handle().new_listener())
            .with_local(retire.new_listener());
        let context = VuContext::new(id, self.context.clone(), stop);

        let thread = std::thread::Builder::new()
            .name(format!("vu-{id}"))
            .spawn(move || run_vu(context))
            .map_err(|e| SchedulerError::Spawn {
                vu: id,
                reason: e.to_string(),
            })?;

        self.active.push(VuHandle { id, retire, thread });

        Ok(())
    }
}

/// The body of a virtual user thread: run iterations back to back until told to stop.
fn run_vu(mut context: VuContext) {
    log::debug!("Starting virtual user {}", context.vu_id());

    let runner_context = context.runner_context().clone();
    while !context.is_stopped() {
        let iteration = context.next_iteration();
        runner_context
            .executor()
            .execute_in_place(runner_context.workflow_executor().run_iteration(
                runner_context.plan(),
                iteration,
                context.stop_signal(),
            ));
    }

    log::debug!(
        "Stopping virtual user {} after {} iterations",
        context.vu_id(),
        context.iterations()
    );
}
