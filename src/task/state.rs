//! Task state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum transitions retained per task.
pub(crate) const MAX_TRANSITIONS: usize = 200;

/// Status of a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Spawned, never invoked.
    Pending,
    /// Invoked at least once and able to continue.
    Running,
    /// Suspended on a gated action until a reviewer decides.
    AwaitingApproval,
    /// Finished with an output.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by quota exhaustion, the iteration ceiling, or session abort.
    Aborted,
}

impl TaskStatus {
    /// Check if this status allows moving to `target`. Statuses only move forward.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            // From Pending
            (Pending, Running) | (Pending, Aborted) |
            // From Running
            (Running, Completed) | (Running, Failed) |
            (Running, AwaitingApproval) | (Running, Aborted) |
            // From AwaitingApproval
            (AwaitingApproval, Running) | (AwaitingApproval, Aborted)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Check if the task is still live (not terminal).
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// A status transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous status.
    pub from: TaskStatus,
    /// New status.
    pub to: TaskStatus,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Reason for the transition.
    pub reason: Option<String>,
}
