use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch::{Receiver, Sender};

/// Owner side of a stop signal.
///
/// The runner holds one of these for the whole run and one more for each virtual user so that a
/// single loop can be retired during a ramp down without stopping the others.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(tokio::sync::watch::channel(false).0),
        }
    }

    /// Signal every listener. Calling this more than once has no further effect.
    pub fn shutdown(&self) {
        if !self.sender.send_replace(true) {
            log::trace!("Shutdown signal sent");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been sent. Once this returns true it keeps
    /// returning true.
    ///
    /// A dropped [ShutdownHandle] counts as a shutdown.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow() || self.receiver.has_changed().is_err()
    }

    /// Wait for the shutdown signal. It is safe to race this with another future so that the
    /// shutdown signal can be used to cancel other work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        // Err means the handle is gone, which is treated the same as a shutdown.
        let _ = self.receiver.wait_for(|shutdown| *shutdown).await;
    }
}

/// The stop signal seen by a single virtual user loop.
///
/// Combines the run-wide shutdown with an optional signal that is local to the loop. Either one
/// firing means the loop should finish its current iteration and exit.
#[derive(Clone, Debug)]
pub struct StopSignal {
    run: DelegatedShutdownListener,
    local: Option<DelegatedShutdownListener>,
}

impl StopSignal {
    pub fn new(run: DelegatedShutdownListener) -> Self {
        Self { run, local: None }
    }

    pub fn with_local(mut self, local: DelegatedShutdownListener) -> Self {
        self.local = Some(local);
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.run.should_shutdown()
            || self
                .local
                .as_ref()
                .is_some_and(DelegatedShutdownListener::should_shutdown)
    }

    /// Resolves once either signal fires.
    pub async fn stopped(&mut self) {
        let Self { run, local } = self;
        match local {
            Some(local) => {
                tokio::select! {
                    _ = run.wait_for_shutdown() => {}
                    _ = local.wait_for_shutdown() => {}
                }
            }
            None => run.wait_for_shutdown().await,
        }
    }

    /// Sleep for `duration` unless a stop is requested first.
    ///
    /// Returns `true` if the full duration elapsed. Nothing is slept when the signal has already
    /// fired.
    pub async fn pause(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}
