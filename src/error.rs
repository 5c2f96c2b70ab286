//! Error types for the data-room review engine.

use std::path::PathBuf;

use uuid::Uuid;

use crate::quota::ResourceClass;
use crate::task::TaskRole;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Quota reservation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    #[error("Quota exceeded for {class}: requested {requested}, {remaining} remaining")]
    Exceeded {
        class: ResourceClass,
        requested: u32,
        remaining: u32,
    },

    #[error("No quota configured for {class}")]
    UnknownClass { class: ResourceClass },
}

/// Approval gate errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("Approval request {id} is unknown or already resolved")]
    UnknownRequest { id: Uuid },

    #[error("Approval request {id} must wait for earlier request {earlier} from the same task")]
    OutOfOrder { id: Uuid, earlier: Uuid },

    #[error("Edited arguments for request {id} are invalid: {reason}")]
    InvalidEdit { id: Uuid, reason: String },
}

/// Session and task-tree errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Iteration limit of {limit} exceeded")]
    IterationLimitExceeded { limit: u32 },

    #[error("Task {id} not found")]
    TaskNotFound { id: Uuid },

    #[error("Task {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Task {id} cannot complete while {live} child task(s) are still live")]
    ChildrenNotSettled { id: Uuid, live: usize },

    #[error("Session {id} has already finished")]
    SessionClosed { id: Uuid },

    #[error("No worker registered for role {role}")]
    NoWorker { role: TaskRole },

    #[error("Session {id} has no runnable task and nothing awaiting approval")]
    Stalled { id: Uuid },
}

/// Worker execution errors. Always recovered at task granularity.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker failed: {reason}")]
    Failed { reason: String },

    #[error("Worker panicked: {message}")]
    Panicked { message: String },

    #[error("Invalid worker input: {0}")]
    InvalidInput(String),
}

/// Capability (tool) execution errors. Fed back to the task, never fatal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Capability {0} is not available in this session")]
    Unavailable(String),
}

/// Checkpoint persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint is not valid session state: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
