//! Approval gate: pending requests with broadcast to reviewers.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{ApprovalDecision, ApprovalEvent, ApprovalRequest, ResumedTask};
use crate::error::ApprovalError;
use crate::task::TaskRole;
use crate::tools::GatedAction;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Holds every unresolved approval request of a session, oldest first.
///
/// A request leaves the gate exactly once: resolved by a decision, or
/// discarded when its task or session ends.
pub struct ApprovalGate {
    pending: Mutex<VecDeque<ApprovalRequest>>,
    tx: broadcast::Sender<ApprovalEvent>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::from_pending(Vec::new())
    }

    /// Rebuild a gate from previously captured requests.
    pub fn from_pending(requests: impl IntoIterator<Item = ApprovalRequest>) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            pending: Mutex::new(requests.into_iter().collect()),
            tx,
        }
    }

    /// Subscribe to gate events.
    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.tx.subscribe()
    }

    /// Record a new pending request for a suspended task.
    pub fn request_approval(
        &self,
        task_id: Uuid,
        role: TaskRole,
        action: GatedAction,
    ) -> ApprovalRequest {
        let request = ApprovalRequest::new(task_id, role, action);
        info!(
            request_id = %request.id,
            task_id = %task_id,
            action = %request.action.kind(),
            "Approval requested"
        );

        self.pending.lock().push_back(request.clone());

        // ok if no reviewer is listening yet
        let _ = self.tx.send(ApprovalEvent::Requested {
            request: request.clone(),
        });
        request
    }

    /// Resolve a pending request.
    ///
    /// Unknown or already-resolved ids are rejected, as are decisions on a
    /// request while an older one from the same task is still pending. An
    /// edit whose arguments do not fit the action leaves the request pending.
    pub fn apply_decision(
        &self,
        id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ResumedTask, ApprovalError> {
        let mut pending = self.pending.lock();

        let index = pending
            .iter()
            .position(|r| r.id == id)
            .ok_or(ApprovalError::UnknownRequest { id })?;
        let task_id = pending[index].task_id;

        if let Some(earlier) = pending
            .iter()
            .take(index)
            .find(|r| r.task_id == task_id)
        {
            warn!(request_id = %id, earlier = %earlier.id, "Decision out of order");
            return Err(ApprovalError::OutOfOrder {
                id,
                earlier: earlier.id,
            });
        }

        let action = match &decision {
            ApprovalDecision::Approve => Some(pending[index].action.clone()),
            ApprovalDecision::Edit { edited_args } => Some(
                pending[index]
                    .action
                    .with_edited_args(edited_args.clone())
                    .map_err(|e| ApprovalError::InvalidEdit {
                        id,
                        reason: e.to_string(),
                    })?,
            ),
            ApprovalDecision::Reject => None,
        };

        let Some(request) = pending.remove(index) else {
            return Err(ApprovalError::UnknownRequest { id });
        };
        drop(pending);

        info!(
            request_id = %id,
            task_id = %task_id,
            decision = %decision.kind(),
            "Approval resolved"
        );
        let _ = self.tx.send(ApprovalEvent::Resolved {
            id,
            task_id,
            decision: decision.kind(),
        });

        Ok(ResumedTask {
            request,
            decision,
            action,
        })
    }

    /// All pending requests, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Pending requests raised by one task.
    pub fn pending_for(&self, task_id: Uuid) -> Vec<ApprovalRequest> {
        self.pending
            .lock()
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Look up a pending request.
    pub fn get(&self, id: Uuid) -> Option<ApprovalRequest> {
        self.pending.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Drop the pending requests of a task that is no longer live.
    pub fn discard_for_task(&self, task_id: Uuid) -> usize {
        let mut pending = self.pending.lock();
        let mut dropped = Vec::new();
        pending.retain(|r| {
            if r.task_id == task_id {
                dropped.push(r.id);
                false
            } else {
                true
            }
        });
        drop(pending);

        for id in &dropped {
            debug!(request_id = %id, task_id = %task_id, "Approval request discarded");
            let _ = self.tx.send(ApprovalEvent::Discarded { id: *id, task_id });
        }
        dropped.len()
    }

    /// Drop every pending request.
    pub fn clear(&self) -> usize {
        let drained: Vec<ApprovalRequest> = self.pending.lock().drain(..).collect();
        for request in &drained {
            let _ = self.tx.send(ApprovalEvent::Discarded {
                id: request.id,
                task_id: request.task_id,
            });
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Discarded pending approvals");
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("pending", &self.len())
            .finish()
    }
}

impl Serialize for ApprovalGate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.pending().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ApprovalGate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let requests = Vec::<ApprovalRequest>::deserialize(deserializer)?;
        Ok(Self::from_pending(requests))
    }
}
