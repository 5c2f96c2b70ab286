//! Session state: everything one review run owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::{ApprovalGate, ApprovalRequest};
use crate::config::SessionConfig;
use crate::quota::{QuotaCounter, QuotaManager, ResourceClass};
use crate::task::{ChildSpec, TaskFailure, TaskRole, TaskStatus, TaskTree, TreeSummary};

/// Terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Why a session was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// The loop ran more iterations than the configured ceiling.
    IterationLimitExceeded { limit: u32 },
    /// A required task's gated action did not fit its quota.
    QuotaExhausted {
        task: Uuid,
        class: ResourceClass,
        requested: u32,
        remaining: u32,
    },
    /// Nothing can run and nothing is waiting for a decision.
    Stalled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IterationLimitExceeded { limit } => {
                write!(f, "iteration limit of {limit} exceeded")
            }
            Self::QuotaExhausted {
                task,
                class,
                requested,
                remaining,
            } => write!(
                f,
                "task {task} exhausted {class} quota (requested {requested}, {remaining} remaining)"
            ),
            Self::Stalled => write!(f, "no runnable task and nothing awaiting approval"),
        }
    }
}

/// One end-to-end run of a task tree.
///
/// Exclusively owns the tree, the quota counters, and the pending approvals.
/// Serializes in full for checkpointing.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionState {
    pub id: Uuid,
    pub config: SessionConfig,
    pub tree: TaskTree,
    pub quotas: QuotaManager,
    pub approvals: ApprovalGate,
    /// Loop iterations consumed so far.
    pub iteration: u32,
    pub status: SessionStatus,
    pub abort_reason: Option<AbortReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(root: ChildSpec, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            quotas: QuotaManager::from_config(&config),
            tree: TaskTree::new(root),
            approvals: ApprovalGate::new(),
            config,
            iteration: 0,
            status: SessionStatus::Running,
            abort_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Requests waiting for a reviewer, oldest first.
    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.approvals.pending()
    }

    /// Output of the root task, once it has completed.
    pub fn root_output(&self) -> Option<&serde_json::Value> {
        self.tree.root().ok().and_then(|root| root.output.as_ref())
    }

    pub(crate) fn finish(&mut self, status: SessionStatus, reason: Option<AbortReason>) {
        self.status = status;
        self.abort_reason = reason;
        self.finished_at = Some(Utc::now());
    }

    /// Snapshot for reporting.
    pub fn summary(&self) -> SessionSummary {
        let mut failures: Vec<FailedTask> = self
            .tree
            .nodes()
            .filter(|n| matches!(n.status, TaskStatus::Failed | TaskStatus::Aborted))
            .map(|n| FailedTask {
                id: n.id,
                role: n.role,
                status: n.status,
                required: n.required,
                reason: n.failure.clone(),
                finished_at: n.finished_at,
            })
            .collect();
        failures.sort_by_key(|f| f.finished_at);

        SessionSummary {
            id: self.id,
            status: self.status,
            abort_reason: self.abort_reason.clone(),
            root_status: self.tree.root().map(|r| r.status).ok(),
            iterations: self.iteration,
            iteration_limit: self.config.iteration_limit,
            quotas: self.quotas.snapshot(),
            tasks: self.tree.summary(),
            pending_approvals: self.approvals.len(),
            failures,
        }
    }
}

/// A FAILED or ABORTED task and its structured reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    pub id: Uuid,
    pub role: TaskRole,
    pub status: TaskStatus,
    pub required: bool,
    pub reason: Option<TaskFailure>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// End-of-run (or mid-run) report of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub status: SessionStatus,
    pub abort_reason: Option<AbortReason>,
    pub root_status: Option<TaskStatus>,
    pub iterations: u32,
    pub iteration_limit: u32,
    pub quotas: Vec<QuotaCounter>,
    pub tasks: TreeSummary,
    pub pending_approvals: usize,
    pub failures: Vec<FailedTask>,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session {}: {}", self.id, self.status)?;
        if let Some(reason) = &self.abort_reason {
            writeln!(f, "  Abort reason: {}", reason)?;
        }
        if let Some(root) = self.root_status {
            writeln!(f, "  Root task: {}", root)?;
        }
        writeln!(f, "  Iterations: {}/{}", self.iterations, self.iteration_limit)?;
        for counter in &self.quotas {
            writeln!(
                f,
                "  Quota {}: {}/{}",
                counter.class, counter.count, counter.ceiling
            )?;
        }
        writeln!(
            f,
            "  Tasks: {} total, {} completed, {} failed, {} aborted, {} live",
            self.tasks.total,
            self.tasks.completed,
            self.tasks.failed,
            self.tasks.aborted,
            self.tasks.pending + self.tasks.running + self.tasks.awaiting_approval
        )?;
        if self.pending_approvals > 0 {
            writeln!(f, "  Pending approvals: {}", self.pending_approvals)?;
        }
        for failure in &self.failures {
            let reason = failure
                .reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "no reason recorded".to_string());
            writeln!(
                f,
                "  {} {} {}: {}",
                failure.role, failure.id, failure.status, reason
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_session_is_running_with_fresh_counters() {
        let session = SessionState::new(
            ChildSpec::required(TaskRole::Coordinator, json!({})),
            SessionConfig::default(),
        );
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.iteration, 0);
        assert_eq!(session.tree.len(), 1);
        assert_eq!(session.quotas.remaining(ResourceClass::PageRetrieval), Some(50));
        assert_eq!(session.quotas.remaining(ResourceClass::ExternalFetch), Some(20));
        assert!(session.pending_approvals().is_empty());
    }

    #[test]
    fn summary_lists_failures_with_reasons() {
        let mut session = SessionState::new(
            ChildSpec::required(TaskRole::Coordinator, json!({})),
            SessionConfig::default(),
        );
        let root = session.tree.root_id();
        session.tree.transition(root, TaskStatus::Running, None).unwrap();
        session
            .tree
            .finish_with_failure(
                root,
                TaskStatus::Failed,
                TaskFailure::Worker {
                    cause: "boom".into(),
                },
            )
            .unwrap();
        session.finish(SessionStatus::Completed, None);

        let summary = session.summary();
        assert_eq!(summary.root_status, Some(TaskStatus::Failed));
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(
            summary.failures[0].reason,
            Some(TaskFailure::Worker {
                cause: "boom".into()
            })
        );

        let text = summary.to_string();
        assert!(text.contains("completed"));
        assert!(text.contains("worker failure: boom"));
    }

    #[test]
    fn abort_reason_serializes_with_kind() {
        let reason = AbortReason::IterationLimitExceeded { limit: 3 };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "iteration_limit_exceeded");
        assert_eq!(json["limit"], 3);
    }
}
