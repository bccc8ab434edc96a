//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Ctrl-C cancels the root signal; workers drain on their own

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::signal::CancellationSource;

/// Cancel `root` when the process receives Ctrl-C.
pub fn cancel_on_interrupt(root: Arc<CancellationSource>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = root.signal();
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    tracing::info!("Interrupt received, stopping workers");
                    root.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
            },
            _ = signal.cancelled() => {}
        }
    })
}

/// Wait for the interrupt listener to exit, logging a failed join.
///
/// Returns `false` when the listener panicked or was aborted.
pub async fn join_listener(listener: JoinHandle<()>) -> bool {
    match listener.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Interrupt listener failed");
            false
        }
    }
}
