use std::future::Future;
use std::time::Duration;

use loadline_core::prelude::DelegatedShutdownListener;

/// The tokio runtime shared by every virtual user thread.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime) -> Self {
        Self { runtime }
    }

    /// Run async code in place, blocking the calling thread until it completes.
    ///
    /// The future is never cancelled by a stop request. Work that should react to a stop must
    /// watch a [loadline_core::prelude::StopSignal] itself.
    pub fn execute_in_place<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }

    /// Submit async code to be run in the background.
    ///
    /// There is no guarantee the future completes before the run ends.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Block for `duration`, returning early if `listener` sees a shutdown.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep_or_shutdown(
        &self,
        duration: Duration,
        listener: &mut DelegatedShutdownListener,
    ) -> bool {
        if listener.should_shutdown() {
            return false;
        }

        self.runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(duration) => true,
                _ = listener.wait_for_shutdown() => false,
            }
        })
    }
}
