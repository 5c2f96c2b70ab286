//! Workers: role-bound executors that advance tasks one step at a time.
//!
//! - `worker`: Worker trait, WorkerOutcome, TaskContext
//! - `registry`: WorkerRegistry: role → worker binding
//! - `playbook`: PlaybookWorker: scripted review used by the binary

pub mod playbook;
pub mod registry;
pub mod worker;

pub use playbook::{DomainPlan, Playbook, PlaybookWorker};
pub use registry::WorkerRegistry;
pub use worker::{TaskContext, Worker, WorkerOutcome};
