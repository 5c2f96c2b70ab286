//! Human-in-the-loop approval of gated actions.
//!
//! - `model`: ApprovalRequest, ApprovalDecision, gate events
//! - `gate`: ApprovalGate: pending requests, decisions, broadcast
//! - `display`: Plain-text rendering of a pending request for reviewers

pub mod display;
pub mod gate;
pub mod model;

pub use display::format_request;
pub use gate::ApprovalGate;
pub use model::{ApprovalDecision, ApprovalEvent, ApprovalRequest, DecisionKind, ResumedTask};
