//! Approval data model: requests, decisions, and gate events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskRole;
use crate::tools::GatedAction;

/// A gated action waiting for a reviewer's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    /// Task suspended on this request.
    pub task_id: Uuid,
    /// Role of the requesting task.
    pub role: TaskRole,
    /// The action as the worker proposed it.
    pub action: GatedAction,
    pub requested_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(task_id: Uuid, role: TaskRole, action: GatedAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            role,
            action,
            requested_at: Utc::now(),
        }
    }

    /// Decisions a reviewer may take on this request.
    pub fn allowed_decisions(&self) -> &'static [DecisionKind] {
        &[DecisionKind::Approve, DecisionKind::Edit, DecisionKind::Reject]
    }
}

/// A reviewer's decision on one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Execute the action with its original arguments.
    Approve,
    /// Execute the action with replacement arguments.
    Edit { edited_args: serde_json::Value },
    /// Do not execute; the task resumes with a rejection.
    Reject,
}

impl ApprovalDecision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Approve => DecisionKind::Approve,
            Self::Edit { .. } => DecisionKind::Edit,
            Self::Reject => DecisionKind::Reject,
        }
    }
}

/// Decision kind without payload, for listing and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Edit,
    Reject,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Edit => write!(f, "edit"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// A request removed from the gate together with the decision that resolved it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumedTask {
    pub request: ApprovalRequest,
    pub decision: ApprovalDecision,
    /// The action to execute, with any edited arguments applied.
    /// `None` when the request was rejected.
    pub action: Option<GatedAction>,
}

/// Gate events, broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalEvent {
    /// A new request is waiting.
    Requested { request: ApprovalRequest },
    /// A request was resolved by a decision.
    Resolved {
        id: Uuid,
        task_id: Uuid,
        decision: DecisionKind,
    },
    /// A request was dropped because its task or session ended.
    Discarded { id: Uuid, task_id: Uuid },
}
