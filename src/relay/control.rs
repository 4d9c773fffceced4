//! Cancellation and task introspection

use super::Relay;

impl Relay {
    /// Cancel every in-flight transfer and range run
    ///
    /// Signals cancellation without waiting. Units observe it at their next
    /// suspension point, delete their local files and release their permits.
    /// Returns the number of tasks that were registered at call time.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        tracing::info!(cancelled, "cancelled all active tasks");
        cancelled
    }

    /// Number of registered tasks (single transfers, range runs and range jobs)
    pub fn active_tasks(&self) -> usize {
        self.registry.len()
    }
}
