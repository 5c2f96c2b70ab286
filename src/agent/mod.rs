//! Orchestration: session state, the step loop, decisions, and checkpoints.

pub mod agent_loop;
pub mod approval;
pub mod checkpoint;
pub mod session;
pub mod submission;

pub use agent_loop::{Orchestrator, StepOutcome};
pub use session::{AbortReason, FailedTask, SessionState, SessionStatus, SessionSummary};
pub use submission::{Submission, SubmissionParser};
