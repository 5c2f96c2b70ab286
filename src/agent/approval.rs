//! Approval flow: applies reviewer decisions and resumes suspended tasks.

use uuid::Uuid;

use crate::agent::session::SessionState;
use crate::approval::ApprovalDecision;
use crate::error::{ApprovalError, Error, SessionError};
use crate::task::{ActionOutcome, ResumeToken, TaskStatus};

use super::agent_loop::Orchestrator;

impl Orchestrator {
    /// Apply a batch of decisions in order.
    ///
    /// Stops at the first decision that cannot be applied; decisions before
    /// it stay applied. Returns the number applied.
    pub async fn resume(
        &self,
        session: &mut SessionState,
        decisions: Vec<(Uuid, ApprovalDecision)>,
    ) -> Result<usize, Error> {
        let mut applied = 0;
        for (request_id, decision) in decisions {
            self.apply_decision(session, request_id, decision).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply one decision and make its task runnable again.
    ///
    /// Approve executes the original action, edit executes the replacement,
    /// and reject executes nothing. The task's next invocation receives the
    /// result as its resume payload.
    pub async fn apply_decision(
        &self,
        session: &mut SessionState,
        request_id: Uuid,
        decision: ApprovalDecision,
    ) -> Result<(), Error> {
        if session.is_finished() {
            return Err(SessionError::SessionClosed { id: session.id }.into());
        }

        let request = session
            .approvals
            .get(request_id)
            .ok_or(ApprovalError::UnknownRequest { id: request_id })?;

        // An edit may ask for more pages than were reserved up front.
        let mut extra_quota = None;
        if let ApprovalDecision::Edit { edited_args } = &decision {
            let edited = request
                .action
                .with_edited_args(edited_args.clone())
                .map_err(|e| ApprovalError::InvalidEdit {
                    id: request_id,
                    reason: e.to_string(),
                })?;
            if let Some(class) = edited.resource_class() {
                let extra = edited
                    .quota_amount()
                    .saturating_sub(request.action.quota_amount());
                let remaining = session.quotas.remaining(class).unwrap_or(0);
                if extra > remaining {
                    return Err(ApprovalError::InvalidEdit {
                        id: request_id,
                        reason: format!(
                            "edit needs {} more {} units, {} remaining",
                            extra, class, remaining
                        ),
                    }
                    .into());
                }
                if extra > 0 {
                    extra_quota = Some((class, extra));
                }
            }
        }

        let resumed = session.approvals.apply_decision(request_id, decision)?;
        let task_id = resumed.request.task_id;

        if let Some((class, extra)) = extra_quota {
            session.quotas.reserve(class, extra)?;
        }

        let outcome = match &resumed.action {
            Some(action) => self.execute_action(action).await,
            None => ActionOutcome::Rejected,
        };
        let action = resumed.action.unwrap_or(resumed.request.action);
        let token = ResumeToken::new(Some(request_id), action, Some(resumed.decision), outcome);

        session.tree.transition(
            task_id,
            TaskStatus::Running,
            Some(format!("{} decision applied", token_decision(&token))),
        )?;
        let node = session.tree.get_mut(task_id)?;
        node.pending_request = None;
        node.deliver(token);

        tracing::info!(request_id = %request_id, task_id = %task_id, "Task resumed");
        Ok(())
    }
}

fn token_decision(token: &ResumeToken) -> String {
    token
        .decision
        .as_ref()
        .map(|d| d.kind().to_string())
        .unwrap_or_else(|| "no".to_string())
}
