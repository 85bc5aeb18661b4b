//! The Run Registry: an in-memory map of live/recent runs.
//!
//! Generalizes `shared_state.rs`'s `SharedState`
//! (`Arc<RwLock<HashMap<String, Value>>>`) to a two-level map: the outer
//! map lock is held only for insert/remove, and each run's state lives
//! behind its own lock so one run's mutation never blocks a `status()`
//! read of a different run (spec.md §5).

use crate::cancellation::CancellationToken;
use crate::context::ExecutionContext;
use crate::error::MovaError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct RunEntry {
    context: Arc<RwLock<ExecutionContext>>,
    cancellation: CancellationToken,
}

#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self { runs: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn register(&self, context: ExecutionContext, cancellation: CancellationToken) -> Arc<RwLock<ExecutionContext>> {
        let run_id = context.run_id.clone();
        let shared = Arc::new(RwLock::new(context));
        let mut guard = self.runs.write().expect("run registry lock poisoned");
        guard.insert(run_id, RunEntry { context: shared.clone(), cancellation });
        shared
    }

    pub fn status(&self, run_id: &str) -> Result<ExecutionContext, MovaError> {
        let guard = self.runs.read().expect("run registry lock poisoned");
        let entry = guard.get(run_id).ok_or_else(|| MovaError::Persistence {
            message: format!("unknown run: {}", run_id),
        })?;
        Ok(entry.context.read().expect("run context lock poisoned").clone())
    }

    pub fn logs(&self, run_id: &str) -> Result<Vec<crate::context::ExecutionLog>, MovaError> {
        Ok(self.status(run_id)?.logs)
    }

    pub fn cancel(&self, run_id: &str) -> Result<(), MovaError> {
        let guard = self.runs.read().expect("run registry lock poisoned");
        let entry = guard.get(run_id).ok_or_else(|| MovaError::Persistence {
            message: format!("unknown run: {}", run_id),
        })?;
        entry.cancellation.cancel();
        Ok(())
    }

    /// Overwrites a run's stored context wholesale. Used by the Executor to
    /// publish progress after each completed action and the final terminal
    /// state once the run ends.
    pub fn update(&self, run_id: &str, context: ExecutionContext) {
        let guard = self.runs.read().expect("run registry lock poisoned");
        if let Some(entry) = guard.get(run_id) {
            *entry.context.write().expect("run context lock poisoned") = context;
        }
    }

    /// Removes a run's state. Callers apply their own retention window
    /// (spec.md §3: "implementation-defined >= 1 h after terminal state").
    pub fn remove(&self, run_id: &str) {
        let mut guard = self.runs.write().expect("run registry lock poisoned");
        guard.remove(run_id);
    }

    pub fn len(&self) -> usize {
        self.runs.read().expect("run registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
