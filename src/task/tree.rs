//! The task tree owned by a session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::task::node::{ChildSpec, TaskFailure, TaskNode, TaskRole};
use crate::task::state::TaskStatus;

/// A child's settled state, as seen by its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildResult {
    pub id: Uuid,
    pub role: TaskRole,
    pub status: TaskStatus,
    pub required: bool,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub failure: Option<TaskFailure>,
}

/// Owns every task node of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    root: Uuid,
    nodes: HashMap<Uuid, TaskNode>,
}

impl TaskTree {
    /// Create a tree holding only the root task. The root is always required.
    pub fn new(mut root: ChildSpec) -> Self {
        root.required = true;
        let node = TaskNode::new(root, None);
        let root = node.id;
        Self {
            root,
            nodes: HashMap::from([(root, node)]),
        }
    }

    pub fn root_id(&self) -> Uuid {
        self.root
    }

    pub fn root(&self) -> Result<&TaskNode, SessionError> {
        self.get(self.root)
    }

    pub fn get(&self, id: Uuid) -> Result<&TaskNode, SessionError> {
        self.nodes.get(&id).ok_or(SessionError::TaskNotFound { id })
    }

    pub fn get_mut(&mut self, id: Uuid) -> Result<&mut TaskNode, SessionError> {
        self.nodes
            .get_mut(&id)
            .ok_or(SessionError::TaskNotFound { id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Append pending children to a live parent, in the given order.
    pub fn spawn_children(
        &mut self,
        parent_id: Uuid,
        specs: Vec<ChildSpec>,
    ) -> Result<Vec<Uuid>, SessionError> {
        let parent = self.get(parent_id)?;
        if parent.status.is_terminal() || !parent.role.can_spawn() {
            return Err(SessionError::InvalidTransition {
                id: parent_id,
                state: parent.status.to_string(),
                target: format!("spawn children as {}", parent.role),
            });
        }

        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let node = TaskNode::new(spec, Some(parent_id));
            ids.push(node.id);
            self.nodes.insert(node.id, node);
        }
        self.get_mut(parent_id)?.children.extend(ids.iter().copied());

        tracing::debug!(parent = %parent_id, ids = ?ids, "Children attached");
        Ok(ids)
    }

    /// Move a task to `target`, enforcing the state machine and the rule that
    /// a task completes only after all of its children have settled.
    pub fn transition(
        &mut self,
        id: Uuid,
        target: TaskStatus,
        reason: Option<String>,
    ) -> Result<(), SessionError> {
        if target == TaskStatus::Completed {
            let live = self.live_children(id)?;
            if live > 0 {
                return Err(SessionError::ChildrenNotSettled { id, live });
            }
        }

        let node = self.get_mut(id)?;
        let from = node.status;
        node.transition_to(target, reason)
            .map_err(|_| SessionError::InvalidTransition {
                id,
                state: from.to_string(),
                target: target.to_string(),
            })
    }

    /// Complete a task with its output.
    pub fn complete(&mut self, id: Uuid, output: serde_json::Value) -> Result<(), SessionError> {
        self.transition(id, TaskStatus::Completed, None)?;
        self.get_mut(id)?.output = Some(output);
        Ok(())
    }

    /// Fail or abort a task with a structured reason.
    pub fn finish_with_failure(
        &mut self,
        id: Uuid,
        status: TaskStatus,
        failure: TaskFailure,
    ) -> Result<(), SessionError> {
        self.transition(id, status, Some(failure.to_string()))?;
        self.get_mut(id)?.failure = Some(failure);
        Ok(())
    }

    fn live_children(&self, id: Uuid) -> Result<usize, SessionError> {
        let node = self.get(id)?;
        Ok(node
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .filter(|c| c.status.is_live())
            .count())
    }

    /// Select the next task to invoke: deepest first, leftmost first.
    ///
    /// A task is runnable when it is PENDING or RUNNING and every child it has
    /// spawned so far is terminal. Tasks under a terminal parent are never
    /// selected.
    pub fn next_runnable(&self) -> Option<Uuid> {
        self.find_runnable(self.root)
    }

    fn find_runnable(&self, id: Uuid) -> Option<Uuid> {
        let node = self.nodes.get(&id)?;
        if !matches!(node.status, TaskStatus::Pending | TaskStatus::Running) {
            return None;
        }

        let mut blocked = false;
        for child in &node.children {
            if let Some(found) = self.find_runnable(*child) {
                return Some(found);
            }
            if self.nodes.get(child).is_some_and(|c| c.status.is_live()) {
                blocked = true;
            }
        }

        (!blocked).then_some(id)
    }

    /// Settled view of a task's children, in spawn order.
    pub fn child_results(&self, id: Uuid) -> Result<Vec<ChildResult>, SessionError> {
        let node = self.get(id)?;
        node.children
            .iter()
            .map(|child_id| {
                let child = self.get(*child_id)?;
                Ok(ChildResult {
                    id: child.id,
                    role: child.role,
                    status: child.status,
                    required: child.required,
                    input: child.input.clone(),
                    output: child.output.clone(),
                    failure: child.failure.clone(),
                })
            })
            .collect()
    }

    /// Live descendants of a task, parents before children.
    pub fn live_descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut found = Vec::new();
        let mut stack: Vec<Uuid> = self
            .nodes
            .get(&id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                if node.status.is_live() {
                    found.push(current);
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        found
    }

    /// Tasks suspended on an approval request.
    pub fn awaiting_approval(&self) -> Vec<Uuid> {
        self.nodes
            .values()
            .filter(|n| n.status == TaskStatus::AwaitingApproval)
            .map(|n| n.id)
            .collect()
    }

    /// Abort every live task in the tree. Returns the aborted ids.
    pub fn abort_all(&mut self, failure: TaskFailure) -> Vec<Uuid> {
        let mut ids = vec![self.root];
        ids.extend(self.live_descendants(self.root));
        self.abort_ids(ids, failure)
    }

    fn abort_ids(&mut self, ids: Vec<Uuid>, failure: TaskFailure) -> Vec<Uuid> {
        let mut aborted = Vec::new();
        for id in ids {
            let live = self.nodes.get(&id).is_some_and(|n| n.status.is_live());
            if live
                && self
                    .finish_with_failure(id, TaskStatus::Aborted, failure.clone())
                    .is_ok()
            {
                aborted.push(id);
            }
        }
        aborted
    }

    /// Propagate a FAILED or ABORTED required task to its parent, and onward
    /// through required ancestors.
    ///
    /// Each failed parent has its remaining live descendants aborted. Returns
    /// every task whose status changed.
    pub fn propagate_failure(&mut self, id: Uuid) -> Result<Vec<Uuid>, SessionError> {
        let mut affected = Vec::new();
        let mut current = id;

        loop {
            let node = self.get(current)?;
            let failed = matches!(node.status, TaskStatus::Failed | TaskStatus::Aborted);
            if !failed || !node.required {
                break;
            }
            let Some(parent_id) = node.parent else {
                break;
            };
            let child_role = node.role;

            let parent = self.get(parent_id)?;
            if parent.status.is_terminal() {
                break;
            }
            let target = if parent.status.can_transition_to(TaskStatus::Failed) {
                TaskStatus::Failed
            } else {
                TaskStatus::Aborted
            };

            let orphans = self.live_descendants(parent_id);
            affected.extend(self.abort_ids(orphans, TaskFailure::ParentFailed { parent: parent_id }));

            self.finish_with_failure(
                parent_id,
                target,
                TaskFailure::ChildFailed {
                    child: current,
                    role: child_role,
                },
            )?;
            tracing::info!(
                task_id = %parent_id,
                child = %current,
                "Required child failed; parent {}",
                target
            );
            affected.push(parent_id);
            current = parent_id;
        }

        Ok(affected)
    }

    /// Check structural invariants of the tree.
    ///
    /// - every child links back to its parent
    /// - a COMPLETED task has no live children
    /// - a terminal task has no live descendants
    pub fn check_invariants(&self) -> Result<(), SessionError> {
        for node in self.nodes.values() {
            for child_id in &node.children {
                let child = self.get(*child_id)?;
                if child.parent != Some(node.id) {
                    return Err(SessionError::InvalidTransition {
                        id: child.id,
                        state: child.status.to_string(),
                        target: format!("child of {}", node.id),
                    });
                }
            }

            if node.status.is_terminal() {
                let live = self.live_descendants(node.id).len();
                if live > 0 {
                    return Err(SessionError::ChildrenNotSettled { id: node.id, live });
                }
            }
        }
        Ok(())
    }

    /// Count tasks per status.
    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary::default();
        for node in self.nodes.values() {
            match node.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::Running => summary.running += 1,
                TaskStatus::AwaitingApproval => summary.awaiting_approval += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Aborted => summary.aborted += 1,
            }
        }
        summary.total = self.nodes.len();
        summary
    }
}

/// Task counts per status.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub awaiting_approval: usize,
    pub completed: usize,
    pub failed: usize,
    pub aborted: usize,
}
