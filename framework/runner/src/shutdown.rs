use loadline_core::prelude::ShutdownHandle;
use tokio::signal;

/// Stop the run when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime, handle: ShutdownHandle) {
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                handle.shutdown();
            }
            Err(e) => {
                log::error!("Failed to listen for Ctrl-C, the run can only be stopped by its deadline: {e}");
            }
        }
    });
}
