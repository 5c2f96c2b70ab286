//! Main orchestrator loop.
//!
//! The orchestrator is the sole driver of a session: it selects the next
//! runnable task, invokes the worker bound to its role, and routes whatever
//! the worker yields through the quota manager and the approval gate.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use uuid::Uuid;

use crate::agent::session::{AbortReason, SessionState, SessionStatus, SessionSummary};
use crate::approval::ApprovalRequest;
use crate::channels::Reviewer;
use crate::config::SessionConfig;
use crate::error::{ApprovalError, Error, QuotaError, SessionError, WorkerError};
use crate::quota::ResourceClass;
use crate::task::{ActionOutcome, ChildSpec, ResumeToken, TaskFailure, TaskRole, TaskStatus};
use crate::tools::{self, Capabilities, GatedAction};
use crate::worker::{TaskContext, WorkerOutcome, WorkerRegistry};

/// Refused decisions tolerated per request before `run` suspends.
const MAX_REVIEW_ATTEMPTS: u32 = 3;

/// Result of a single orchestrator step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A task was invoked and its outcome applied.
    Progressed { task_id: Uuid },
    /// Nothing can run until these requests are decided.
    AwaitingApproval(Vec<ApprovalRequest>),
    /// The session has reached a terminal status.
    Finished(SessionStatus),
}

/// Drives sessions to completion.
pub struct Orchestrator {
    workers: WorkerRegistry,
    capabilities: Arc<dyn Capabilities>,
}

impl Orchestrator {
    pub fn new(workers: WorkerRegistry, capabilities: Arc<dyn Capabilities>) -> Self {
        Self {
            workers,
            capabilities,
        }
    }

    /// Start a new session with a single pending root task.
    pub fn start_session(&self, root: ChildSpec, config: SessionConfig) -> Result<SessionState, Error> {
        config.validate()?;

        let session = SessionState::new(root, config);
        tracing::info!(
            session_id = %session.id,
            root = %session.tree.root_id(),
            iteration_limit = session.config.iteration_limit,
            "Session started"
        );
        Ok(session)
    }

    /// Advance the session by one iteration.
    ///
    /// A step that finds every live task suspended on a decision returns the
    /// pending requests without consuming an iteration.
    pub async fn step(&self, session: &mut SessionState) -> Result<StepOutcome, Error> {
        if session.is_finished() {
            return Ok(StepOutcome::Finished(session.status));
        }
        if self.settle(session)? {
            return Ok(StepOutcome::Finished(session.status));
        }

        let Some(task_id) = session.tree.next_runnable() else {
            let pending = session.approvals.pending();
            if !pending.is_empty() {
                tracing::debug!(count = pending.len(), "All live tasks awaiting approval");
                return Ok(StepOutcome::AwaitingApproval(pending));
            }
            self.abort(session, AbortReason::Stalled);
            return Ok(StepOutcome::Finished(session.status));
        };

        let limit = session.config.iteration_limit;
        if session.iteration >= limit {
            self.abort(session, AbortReason::IterationLimitExceeded { limit });
            return Ok(StepOutcome::Finished(session.status));
        }
        session.iteration += 1;

        self.dispatch(session, task_id).await?;

        session.tree.check_invariants()?;
        self.settle(session)?;
        Ok(StepOutcome::Progressed { task_id })
    }

    /// Step until the session finishes or needs a decision.
    pub async fn run_until_blocked(&self, session: &mut SessionState) -> Result<StepOutcome, Error> {
        loop {
            match self.step(session).await? {
                StepOutcome::Progressed { .. } => continue,
                other => return Ok(other),
            }
        }
    }

    /// Run to completion, asking `reviewer` for every decision.
    ///
    /// Each decision is applied as soon as it is given. A decision the gate
    /// refuses leaves its request pending and is asked for again. Returns
    /// early, with the session still running, if the reviewer declines to
    /// decide or keeps giving refused decisions.
    pub async fn run(
        &self,
        session: &mut SessionState,
        reviewer: &dyn Reviewer,
    ) -> Result<SessionSummary, Error> {
        loop {
            match self.run_until_blocked(session).await? {
                StepOutcome::Finished(_) => break,
                StepOutcome::AwaitingApproval(requests) => {
                    for request in &requests {
                        if !self.review_request(session, reviewer, request).await? {
                            tracing::info!(
                                session_id = %session.id,
                                pending = session.approvals.len(),
                                "Review suspended"
                            );
                            return Ok(session.summary());
                        }
                    }
                }
                StepOutcome::Progressed { .. } => {}
            }
        }

        Ok(session.summary())
    }

    /// Ask for decisions on one request until one applies.
    ///
    /// Returns `false` when the reviewer suspends or runs out of attempts.
    async fn review_request(
        &self,
        session: &mut SessionState,
        reviewer: &dyn Reviewer,
        request: &ApprovalRequest,
    ) -> Result<bool, Error> {
        for attempt in 1..=MAX_REVIEW_ATTEMPTS {
            let Some(decision) = reviewer.review(request).await else {
                return Ok(false);
            };
            match self.apply_decision(session, request.id, decision).await {
                Ok(()) => return Ok(true),
                Err(Error::Approval(
                    e @ (ApprovalError::InvalidEdit { .. } | ApprovalError::OutOfOrder { .. }),
                )) => {
                    tracing::warn!(
                        request_id = %request.id,
                        attempt,
                        error = %e,
                        "Decision refused; request stays pending"
                    );
                    reviewer.decision_refused(request, &e).await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            request_id = %request.id,
            attempts = MAX_REVIEW_ATTEMPTS,
            "No applicable decision"
        );
        Ok(false)
    }

    /// Invoke the worker for one task and apply what it yields.
    async fn dispatch(&self, session: &mut SessionState, task_id: Uuid) -> Result<(), Error> {
        let role = session.tree.get(task_id)?.role;
        let worker = self.workers.get(role)?;

        if session.tree.get(task_id)?.status == TaskStatus::Pending {
            session.tree.transition(task_id, TaskStatus::Running, None)?;
        }

        let children = session.tree.child_results(task_id)?;
        let ctx = {
            let node = session.tree.get_mut(task_id)?;
            node.invocations += 1;
            let ctx = TaskContext::from_node(node, children);
            node.resume = None;
            ctx
        };

        tracing::debug!(
            task_id = %task_id,
            role = %role,
            worker = worker.name(),
            invocation = ctx.invocation,
            iteration = session.iteration,
            "Invoking worker"
        );

        let outcome = match AssertUnwindSafe(worker.step(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(WorkerError::Panicked {
                message: panic_message(payload),
            }),
        };

        match outcome {
            Ok(WorkerOutcome::Completed(output)) => {
                if let Err(e) = session.tree.complete(task_id, output) {
                    self.fail_task(
                        session,
                        task_id,
                        TaskFailure::InvalidOutcome {
                            reason: e.to_string(),
                        },
                    )?;
                } else {
                    tracing::info!(task_id = %task_id, role = %role, "Task completed");
                }
            }
            Ok(WorkerOutcome::Failed(cause)) => {
                self.fail_task(session, task_id, TaskFailure::Worker { cause })?;
            }
            Err(e) => {
                self.fail_task(
                    session,
                    task_id,
                    TaskFailure::Worker {
                        cause: e.to_string(),
                    },
                )?;
            }
            Ok(WorkerOutcome::SpawnChildren(specs)) => {
                if specs.is_empty() {
                    self.fail_task(
                        session,
                        task_id,
                        TaskFailure::InvalidOutcome {
                            reason: "spawned no children".to_string(),
                        },
                    )?;
                } else if !role.can_spawn() {
                    self.fail_task(
                        session,
                        task_id,
                        TaskFailure::InvalidOutcome {
                            reason: format!("{} tasks cannot spawn children", role),
                        },
                    )?;
                } else {
                    let ids = session.tree.spawn_children(task_id, specs)?;
                    tracing::info!(task_id = %task_id, children = ids.len(), "Spawned child tasks");
                }
            }
            Ok(WorkerOutcome::GatedAction(action)) => {
                self.handle_action(session, task_id, role, action).await?;
            }
        }

        Ok(())
    }

    /// Quota check, then either suspend for approval or execute immediately.
    async fn handle_action(
        &self,
        session: &mut SessionState,
        task_id: Uuid,
        role: TaskRole,
        action: GatedAction,
    ) -> Result<(), Error> {
        if let Some(class) = action.resource_class() {
            match session.quotas.reserve(class, action.quota_amount()) {
                Ok(()) => {}
                Err(QuotaError::Exceeded {
                    class,
                    requested,
                    remaining,
                }) => {
                    return self.quota_exhausted(session, task_id, class, requested, remaining);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if session.config.requires_approval(role, action.kind()) {
            session.tree.transition(
                task_id,
                TaskStatus::AwaitingApproval,
                Some(format!("awaiting approval for {}", action.kind())),
            )?;
            let request = session.approvals.request_approval(task_id, role, action);
            session.tree.get_mut(task_id)?.pending_request = Some(request.id);
            return Ok(());
        }

        let outcome = self.execute_action(&action).await;
        let token = ResumeToken::new(None, action, None, outcome);
        session.tree.get_mut(task_id)?.deliver(token);
        Ok(())
    }

    fn quota_exhausted(
        &self,
        session: &mut SessionState,
        task_id: Uuid,
        class: ResourceClass,
        requested: u32,
        remaining: u32,
    ) -> Result<(), Error> {
        session.tree.finish_with_failure(
            task_id,
            TaskStatus::Aborted,
            TaskFailure::QuotaExceeded {
                class,
                requested,
                remaining,
            },
        )?;

        if session.tree.get(task_id)?.required {
            self.abort(
                session,
                AbortReason::QuotaExhausted {
                    task: task_id,
                    class,
                    requested,
                    remaining,
                },
            );
        } else {
            tracing::warn!(task_id = %task_id, class = %class, "Best-effort task aborted on quota");
        }
        Ok(())
    }

    /// Fail a task and propagate through required ancestors.
    fn fail_task(
        &self,
        session: &mut SessionState,
        task_id: Uuid,
        failure: TaskFailure,
    ) -> Result<(), Error> {
        tracing::warn!(task_id = %task_id, reason = %failure, "Task failed");
        session
            .tree
            .finish_with_failure(task_id, TaskStatus::Failed, failure)?;

        for affected in session.tree.propagate_failure(task_id)? {
            session.approvals.discard_for_task(affected);
        }
        Ok(())
    }

    /// Run an action against the capability backend.
    pub(crate) async fn execute_action(&self, action: &GatedAction) -> ActionOutcome {
        match tools::execute(self.capabilities.as_ref(), action).await {
            Ok(output) => ActionOutcome::Executed { output },
            Err(e) => ActionOutcome::CapabilityFailed {
                error: e.to_string(),
            },
        }
    }

    /// Mark the session completed once the root is terminal.
    fn settle(&self, session: &mut SessionState) -> Result<bool, SessionError> {
        if session.is_finished() {
            return Ok(true);
        }
        let root = session.tree.root()?;
        if !root.status.is_terminal() {
            return Ok(false);
        }

        let root_status = root.status;
        session.approvals.clear();
        session.finish(SessionStatus::Completed, None);
        tracing::info!(
            session_id = %session.id,
            root_status = %root_status,
            iterations = session.iteration,
            "Session completed"
        );
        Ok(true)
    }

    /// Abort every live task, discard pending approvals, and close the session.
    pub(crate) fn abort(&self, session: &mut SessionState, reason: AbortReason) {
        let failure = match &reason {
            AbortReason::IterationLimitExceeded { limit } => {
                TaskFailure::IterationLimitExceeded { limit: *limit }
            }
            other => TaskFailure::SessionAborted {
                reason: other.to_string(),
            },
        };

        let aborted = session.tree.abort_all(failure);
        let discarded = session.approvals.clear();
        tracing::error!(
            session_id = %session.id,
            reason = %reason,
            aborted_tasks = aborted.len(),
            discarded_approvals = discarded,
            "Session aborted"
        );
        session.finish(SessionStatus::Aborted, Some(reason));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
