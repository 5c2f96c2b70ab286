//! The worker contract: one step of one task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::task::{ChildResult, ChildSpec, ResumeToken, TaskNode, TaskRole};
use crate::tools::GatedAction;

/// What a worker yields at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// The task is done.
    Completed(serde_json::Value),
    /// The task cannot continue.
    Failed(String),
    /// The task needs an action performed before it can continue.
    GatedAction(GatedAction),
    /// The task delegates work and waits for the children to settle.
    SpawnChildren(Vec<ChildSpec>),
}

/// Everything a worker sees when invoked. Owned, so workers can be `'static`.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: Uuid,
    pub role: TaskRole,
    pub input: serde_json::Value,
    /// Settled view of the task's children, in spawn order.
    pub children: Vec<ChildResult>,
    /// Resolution of the task's last gated action, if not yet seen.
    pub resume: Option<ResumeToken>,
    /// Every resolved gated action of this task, oldest first.
    pub history: Vec<ResumeToken>,
    /// 1-based invocation count, including this one.
    pub invocation: u32,
}

impl TaskContext {
    pub fn from_node(node: &TaskNode, children: Vec<ChildResult>) -> Self {
        Self {
            task_id: node.id,
            role: node.role,
            input: node.input.clone(),
            children,
            resume: node.resume.clone(),
            history: node.history.clone(),
            invocation: node.invocations,
        }
    }
}

/// Executor bound to a task role.
///
/// A step runs until the task completes, fails, spawns children, or needs a
/// gated action. Workers must not block indefinitely; they are re-invoked
/// with the result of whatever they yielded.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Human-readable name, for logs.
    fn name(&self) -> &str;

    /// Advance the task by one step.
    async fn step(&self, ctx: TaskContext) -> Result<WorkerOutcome, WorkerError>;
}
