//! Dataroom Review: a resumable orchestration engine for supervised
//! due-diligence reviews.

pub mod agent;
pub mod approval;
pub mod channels;
pub mod config;
pub mod error;
pub mod quota;
pub mod task;
pub mod tools;
pub mod worker;

pub use agent::{Orchestrator, SessionState, SessionStatus, SessionSummary, StepOutcome};
pub use config::SessionConfig;
pub use error::{Error, Result};
