//! Task nodes: the hierarchical unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::ApprovalDecision;
use crate::quota::ResourceClass;
use crate::task::state::{MAX_TRANSITIONS, StateTransition, TaskStatus};
use crate::tools::GatedAction;

/// What a task is for. Selects the worker and the approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    /// Plans the review and delegates to specialists.
    Coordinator,
    /// Analyses one risk domain against the data room.
    AnalysisSpecialist,
    /// Turns finished findings into the final report.
    ReportFormatter,
}

impl TaskRole {
    /// Whether tasks of this role may spawn children.
    pub fn can_spawn(&self) -> bool {
        !matches!(self, Self::ReportFormatter)
    }
}

impl std::fmt::Display for TaskRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Coordinator => "coordinator",
            Self::AnalysisSpecialist => "analysis_specialist",
            Self::ReportFormatter => "report_formatter",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coordinator" => Ok(Self::Coordinator),
            "analysis_specialist" => Ok(Self::AnalysisSpecialist),
            "report_formatter" => Ok(Self::ReportFormatter),
            _ => Err(format!("Unknown task role: {}", s)),
        }
    }
}

fn default_required() -> bool {
    true
}

/// Role and input of a task to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub role: TaskRole,
    /// Role-specific instructions and context.
    #[serde(default)]
    pub input: serde_json::Value,
    /// A required task's failure fails its parent; a best-effort task's does not.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ChildSpec {
    /// A child whose failure propagates to its parent.
    pub fn required(role: TaskRole, input: serde_json::Value) -> Self {
        Self {
            role,
            input,
            required: true,
        }
    }

    /// A child that may fail without failing its parent.
    pub fn best_effort(role: TaskRole, input: serde_json::Value) -> Self {
        Self {
            role,
            input,
            required: false,
        }
    }
}

/// Structured reason carried by every FAILED or ABORTED task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    /// The worker returned an error or panicked.
    Worker { cause: String },
    /// A required child finished without completing.
    ChildFailed { child: Uuid, role: TaskRole },
    /// The parent failed while this task was still live.
    ParentFailed { parent: Uuid },
    /// A gated action would have exceeded its quota.
    QuotaExceeded {
        class: ResourceClass,
        requested: u32,
        remaining: u32,
    },
    /// The orchestrator loop hit its iteration ceiling.
    IterationLimitExceeded { limit: u32 },
    /// The session was aborted for a reason outside this task.
    SessionAborted { reason: String },
    /// The worker yielded something this task is not allowed to do.
    InvalidOutcome { reason: String },
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Worker { cause } => write!(f, "worker failure: {cause}"),
            Self::ChildFailed { child, role } => {
                write!(f, "required {role} child {child} did not complete")
            }
            Self::ParentFailed { parent } => write!(f, "parent {parent} failed"),
            Self::QuotaExceeded {
                class,
                requested,
                remaining,
            } => write!(
                f,
                "quota exceeded for {class}: requested {requested}, {remaining} remaining"
            ),
            Self::IterationLimitExceeded { limit } => {
                write!(f, "iteration limit of {limit} exceeded")
            }
            Self::SessionAborted { reason } => write!(f, "session aborted: {reason}"),
            Self::InvalidOutcome { reason } => write!(f, "invalid worker outcome: {reason}"),
        }
    }
}

/// What happened to a gated action once it was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The capability ran and returned a result.
    Executed { output: serde_json::Value },
    /// The capability ran and reported an error.
    CapabilityFailed { error: String },
    /// A reviewer rejected the action; nothing was executed.
    Rejected,
}

/// Payload fed back into a task once one of its gated actions is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeToken {
    /// Approval request that suspended the task, if the action was reviewed.
    pub request_id: Option<Uuid>,
    /// The action as executed (after any reviewer edits).
    pub action: GatedAction,
    /// The reviewer's decision, if the action was reviewed.
    pub decision: Option<ApprovalDecision>,
    pub outcome: ActionOutcome,
    pub resolved_at: DateTime<Utc>,
}

impl ResumeToken {
    pub fn new(
        request_id: Option<Uuid>,
        action: GatedAction,
        decision: Option<ApprovalDecision>,
        outcome: ActionOutcome,
    ) -> Self {
        Self {
            request_id,
            action,
            decision,
            outcome,
            resolved_at: Utc::now(),
        }
    }

    /// Whether the action was rejected by a reviewer.
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Rejected)
    }
}

/// A node in the task tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: Uuid,
    /// Parent task; lookup only, the tree owns every node.
    pub parent: Option<Uuid>,
    pub role: TaskRole,
    pub status: TaskStatus,
    pub input: serde_json::Value,
    /// Set when the task completes.
    pub output: Option<serde_json::Value>,
    /// Children in spawn order.
    pub children: Vec<Uuid>,
    pub required: bool,
    /// Set when the task fails or aborts.
    pub failure: Option<TaskFailure>,
    /// Approval request this task is suspended on.
    pub pending_request: Option<Uuid>,
    /// Resolution not yet delivered to the worker.
    pub resume: Option<ResumeToken>,
    /// Every resolved gated action, oldest first.
    pub history: Vec<ResumeToken>,
    /// Number of times the worker has been invoked for this task.
    pub invocations: u32,
    pub transitions: Vec<StateTransition>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskNode {
    /// Create a pending node from a spec.
    pub fn new(spec: ChildSpec, parent: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent,
            role: spec.role,
            status: TaskStatus::Pending,
            input: spec.input,
            output: None,
            children: Vec::new(),
            required: spec.required,
            failure: None,
            pending_request: None,
            resume: None,
            history: Vec::new(),
            invocations: 0,
            transitions: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition to a new status.
    pub fn transition_to(
        &mut self,
        new_status: TaskStatus,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status, new_status
            ));
        }

        self.transitions.push(StateTransition {
            from: self.status,
            to: new_status,
            timestamp: Utc::now(),
            reason,
        });

        if self.transitions.len() > MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        self.status = new_status;
        if new_status.is_terminal() {
            self.finished_at = Some(Utc::now());
            self.pending_request = None;
        }

        Ok(())
    }

    /// Record a resolved gated action and queue it for the next invocation.
    pub fn deliver(&mut self, token: ResumeToken) {
        self.history.push(token.clone());
        self.resume = Some(token);
    }
}
