//! Reviewer channels: where approval decisions come from.

pub mod cli;

use async_trait::async_trait;

use crate::approval::{ApprovalDecision, ApprovalRequest};
use crate::error::ApprovalError;

pub use cli::CliReviewer;

/// A source of approval decisions.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Decide one pending request. `None` suspends the session so it can be
    /// checkpointed and resumed later.
    async fn review(&self, request: &ApprovalRequest) -> Option<ApprovalDecision>;

    /// A decision from this reviewer could not be applied. The request stays
    /// pending and is reviewed again.
    async fn decision_refused(&self, _request: &ApprovalRequest, _error: &ApprovalError) {}
}

/// Approves everything. For unattended runs.
pub struct AutoApprove;

#[async_trait]
impl Reviewer for AutoApprove {
    async fn review(&self, request: &ApprovalRequest) -> Option<ApprovalDecision> {
        tracing::info!(
            request_id = %request.id,
            action = %request.action.kind(),
            "Auto-approving"
        );
        Some(ApprovalDecision::Approve)
    }
}
