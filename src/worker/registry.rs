//! Worker registry: one worker per task role.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SessionError;
use crate::task::TaskRole;
use crate::worker::Worker;

/// Registry of workers keyed by the role they serve.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<TaskRole, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a worker to a role, replacing any previous binding.
    pub fn register(&mut self, role: TaskRole, worker: Arc<dyn Worker>) {
        tracing::debug!(role = %role, worker = worker.name(), "Registered worker");
        self.workers.insert(role, worker);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, role: TaskRole, worker: Arc<dyn Worker>) -> Self {
        self.register(role, worker);
        self
    }

    /// Bind one worker to every role.
    pub fn with_all(mut self, worker: Arc<dyn Worker>) -> Self {
        for role in [
            TaskRole::Coordinator,
            TaskRole::AnalysisSpecialist,
            TaskRole::ReportFormatter,
        ] {
            self.register(role, worker.clone());
        }
        self
    }

    pub fn get(&self, role: TaskRole) -> Result<Arc<dyn Worker>, SessionError> {
        self.workers
            .get(&role)
            .cloned()
            .ok_or(SessionError::NoWorker { role })
    }

    pub fn roles(&self) -> Vec<TaskRole> {
        let mut roles: Vec<_> = self.workers.keys().copied().collect();
        roles.sort();
        roles
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("roles", &self.roles())
            .finish()
    }
}
