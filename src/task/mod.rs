//! Task tree: nodes, the status state machine, and tree-wide operations.
//!
//! - `state`: Task status machine (Pending → Running → Completed/Failed/AwaitingApproval/Aborted)
//! - `node`: TaskNode, roles, spawn specs, failure reasons, resume tokens
//! - `tree`: TaskTree: ownership, spawning, selection, failure propagation

pub mod node;
pub mod state;
pub mod tree;

pub use node::{ActionOutcome, ChildSpec, ResumeToken, TaskFailure, TaskNode, TaskRole};
pub use state::{StateTransition, TaskStatus};
pub use tree::{ChildResult, TaskTree, TreeSummary};
