//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Relay;

/// How long shutdown waits for cancelled tasks to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry poll interval while waiting
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Relay {
    /// Gracefully shut down the relay
    ///
    /// 1. Stops accepting new submissions (they fail with `Error::ShuttingDown`)
    /// 2. Cancels every registered task
    /// 3. Waits up to 30 seconds for the tasks to finish their cleanup
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// # Errors
    ///
    /// Currently always succeeds; a timeout while waiting is logged and the
    /// shutdown proceeds.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new transfers");

        let cancelled = self.registry.cancel_all();
        tracing::info!(cancelled, "Signaled cancellation to all active tasks");

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_tasks()).await {
            Ok(()) => tracing::info!("All active tasks finished"),
            Err(_) => tracing::warn!(
                remaining = self.registry.len(),
                "Timeout waiting for tasks to finish, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    async fn wait_for_active_tasks(&self) {
        loop {
            let active = self.registry.len();
            if active == 0 {
                return;
            }
            tracing::debug!(active, "Waiting for active tasks to finish");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}
