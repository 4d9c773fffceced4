//! Registry of in-flight tasks and their cancellation tokens

use crate::types::TaskId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Identity and cancellation token of a registered task
#[derive(Clone, Debug)]
pub struct TaskHandle {
    /// Registry-assigned id
    pub id: TaskId,
    /// Token observed by every suspension point of the task
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    tasks: HashMap<TaskId, CancellationToken>,
}

/// Set of handles of not-yet-finished operations
///
/// Single transfers, range runs and range jobs are registered here so they
/// can be counted and cancelled as a whole. Registration returns a
/// [`TaskGuard`] that removes the handle when dropped.
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Critical sections never panic, but a poisoned map is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, token: CancellationToken) -> TaskGuard {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = TaskId(state.next_id);
            state.tasks.insert(id, token.clone());
            id
        };
        tracing::debug!(task_id = id.0, "task registered");

        TaskGuard {
            registry: self.clone(),
            handle: TaskHandle { id, token },
        }
    }

    /// Register a top-level task with a fresh token
    pub fn register(&self) -> TaskGuard {
        self.insert(CancellationToken::new())
    }

    /// Register a task whose token is cancelled along with `parent`
    pub fn register_child(&self, parent: &CancellationToken) -> TaskGuard {
        self.insert(parent.child_token())
    }

    /// Remove a task; returns false if it was already removed
    pub fn complete(&self, id: TaskId) -> bool {
        let removed = self.lock().tasks.remove(&id).is_some();
        if removed {
            tracing::debug!(task_id = id.0, "task completed");
        }
        removed
    }

    /// Cancel every registered task without waiting for it
    ///
    /// Returns the number of handles that were registered at call time.
    pub fn cancel_all(&self) -> usize {
        let state = self.lock();
        for (id, token) in state.tasks.iter() {
            tracing::debug!(task_id = id.0, "signaling cancellation");
            token.cancel();
        }
        state.tasks.len()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Whether no task is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is still registered
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().tasks.contains_key(&id)
    }
}

/// Registration of one task; completes it on drop
#[derive(Debug)]
pub struct TaskGuard {
    registry: TaskRegistry,
    handle: TaskHandle,
}

impl TaskGuard {
    /// Registry-assigned id
    pub fn id(&self) -> TaskId {
        self.handle.id
    }

    /// The task's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.handle.token
    }

    /// Copy of the registered handle
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.registry.complete(self.handle.id);
    }
}
